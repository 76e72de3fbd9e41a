//! Shared fixtures for the integration tests

use courtside::config::CrawlerConfig;
use courtside::crawler::CrawlSettings;
use std::time::Duration;

/// A minimal basketball-reference style player page
pub fn player_page(name: &str, image: &str, positions: &[&str], points: f64) -> String {
    let rows: String = positions
        .iter()
        .map(|pos| format!(r#"<tr><td data-stat="pos">{}</td></tr>"#, pos))
        .collect();

    format!(
        r#"<html><body>
        <div id="meta">
          <img itemscope="image" src="https://cdn.example.com/req/headshots/{image}">
          <h1 itemprop="name"><span>{name}</span></h1>
          <p><strong>NBA Debut: </strong><a href="/boxscores/x.html">November 3, 1996</a>
          </p>
        </div>
        <table id="per_game">
          <tbody>{rows}</tbody>
          <tfoot><tr>
            <td data-stat="pts_per_g">{points}</td>
            <td data-stat="fg_pct">.447</td>
          </tr></tfoot>
        </table>
        <table id="advanced">
          <tfoot><tr><td data-stat="ts_pct">.550</td></tr></tfoot>
        </table>
        </body></html>"#
    )
}

/// Crawl settings that do not sleep between retries
pub fn fast_settings(workers: usize) -> CrawlSettings {
    CrawlSettings {
        workers,
        retry_delay: Duration::ZERO,
        extraction_timeout: Duration::from_secs(10),
        commit_batch_size: 2,
        ..CrawlSettings::from_config(&CrawlerConfig::default())
    }
}
