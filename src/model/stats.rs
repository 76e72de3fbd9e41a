use serde::{Deserialize, Serialize};

/// Which stats table on a player page a field is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTable {
    /// Career row of the per-game table
    PerGame,
    /// Career row of the advanced table
    Advanced,
}

impl StatTable {
    pub fn table_id(&self) -> &'static str {
        match self {
            Self::PerGame => "per_game",
            Self::Advanced => "advanced",
        }
    }
}

/// Every numeric statistic tracked for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatField {
    FieldGoalMade,
    FieldGoalAttempted,
    FieldGoalPct,
    ThreePtMade,
    ThreePtAttempted,
    ThreePtPct,
    FreeThrowMade,
    FreeThrowAttempted,
    FreeThrowPct,
    TrueShootingPct,
    Points,
    OffensiveRebounds,
    DefensiveRebounds,
    TotalRebounds,
    Assists,
    Steals,
    Blocks,
    Turnovers,
}

impl StatField {
    pub const ALL: [StatField; 18] = [
        Self::FieldGoalMade,
        Self::FieldGoalAttempted,
        Self::FieldGoalPct,
        Self::ThreePtMade,
        Self::ThreePtAttempted,
        Self::ThreePtPct,
        Self::FreeThrowMade,
        Self::FreeThrowAttempted,
        Self::FreeThrowPct,
        Self::TrueShootingPct,
        Self::Points,
        Self::OffensiveRebounds,
        Self::DefensiveRebounds,
        Self::TotalRebounds,
        Self::Assists,
        Self::Steals,
        Self::Blocks,
        Self::Turnovers,
    ];

    /// Column name in the `players` table, also the JSON key
    pub fn column(&self) -> &'static str {
        match self {
            Self::FieldGoalMade => "field_goal_made",
            Self::FieldGoalAttempted => "field_goal_attempted",
            Self::FieldGoalPct => "field_goal_pct",
            Self::ThreePtMade => "three_pt_made",
            Self::ThreePtAttempted => "three_pt_attempted",
            Self::ThreePtPct => "three_pt_pct",
            Self::FreeThrowMade => "free_throw_made",
            Self::FreeThrowAttempted => "free_throw_attempted",
            Self::FreeThrowPct => "free_throw_pct",
            Self::TrueShootingPct => "true_stg_pct",
            Self::Points => "points",
            Self::OffensiveRebounds => "off_reb",
            Self::DefensiveRebounds => "def_reb",
            Self::TotalRebounds => "tot_reb",
            Self::Assists => "assists",
            Self::Steals => "steals",
            Self::Blocks => "blocks",
            Self::Turnovers => "turnovers",
        }
    }

    /// `data-stat` attribute of the cell holding this value
    pub fn data_stat(&self) -> &'static str {
        match self {
            Self::FieldGoalMade => "fg_per_g",
            Self::FieldGoalAttempted => "fga_per_g",
            Self::FieldGoalPct => "fg_pct",
            Self::ThreePtMade => "fg3_per_g",
            Self::ThreePtAttempted => "fg3a_per_g",
            Self::ThreePtPct => "fg3_pct",
            Self::FreeThrowMade => "ft_per_g",
            Self::FreeThrowAttempted => "fta_per_g",
            Self::FreeThrowPct => "ft_pct",
            Self::TrueShootingPct => "ts_pct",
            Self::Points => "pts_per_g",
            Self::OffensiveRebounds => "orb_per_g",
            Self::DefensiveRebounds => "drb_per_g",
            Self::TotalRebounds => "trb_per_g",
            Self::Assists => "ast_per_g",
            Self::Steals => "stl_per_g",
            Self::Blocks => "blk_per_g",
            Self::Turnovers => "tov_per_g",
        }
    }

    pub fn table(&self) -> StatTable {
        match self {
            Self::TrueShootingPct => StatTable::Advanced,
            _ => StatTable::PerGame,
        }
    }

    /// Whether the field belongs to the nested `shooting` object of the JSON view
    pub fn is_shooting(&self) -> bool {
        !matches!(
            self,
            Self::OffensiveRebounds
                | Self::DefensiveRebounds
                | Self::TotalRebounds
                | Self::Assists
                | Self::Steals
                | Self::Blocks
                | Self::Turnovers
        )
    }
}

/// Career per-game averages and percentages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub field_goal_made: Option<f64>,
    pub field_goal_attempted: Option<f64>,
    pub field_goal_pct: Option<f64>,
    pub three_pt_made: Option<f64>,
    pub three_pt_attempted: Option<f64>,
    pub three_pt_pct: Option<f64>,
    pub free_throw_made: Option<f64>,
    pub free_throw_attempted: Option<f64>,
    pub free_throw_pct: Option<f64>,
    pub true_stg_pct: Option<f64>,
    pub points: Option<f64>,
    pub off_reb: Option<f64>,
    pub def_reb: Option<f64>,
    pub tot_reb: Option<f64>,
    pub assists: Option<f64>,
    pub steals: Option<f64>,
    pub blocks: Option<f64>,
    pub turnovers: Option<f64>,
}

impl PlayerStats {
    pub fn get(&self, field: StatField) -> Option<f64> {
        *self.slot(field)
    }

    pub fn set(&mut self, field: StatField, value: Option<f64>) {
        *self.slot_mut(field) = value;
    }

    /// Number of fields with a known value
    pub fn known(&self) -> usize {
        StatField::ALL
            .iter()
            .filter(|f| self.get(**f).is_some())
            .count()
    }

    fn slot(&self, field: StatField) -> &Option<f64> {
        match field {
            StatField::FieldGoalMade => &self.field_goal_made,
            StatField::FieldGoalAttempted => &self.field_goal_attempted,
            StatField::FieldGoalPct => &self.field_goal_pct,
            StatField::ThreePtMade => &self.three_pt_made,
            StatField::ThreePtAttempted => &self.three_pt_attempted,
            StatField::ThreePtPct => &self.three_pt_pct,
            StatField::FreeThrowMade => &self.free_throw_made,
            StatField::FreeThrowAttempted => &self.free_throw_attempted,
            StatField::FreeThrowPct => &self.free_throw_pct,
            StatField::TrueShootingPct => &self.true_stg_pct,
            StatField::Points => &self.points,
            StatField::OffensiveRebounds => &self.off_reb,
            StatField::DefensiveRebounds => &self.def_reb,
            StatField::TotalRebounds => &self.tot_reb,
            StatField::Assists => &self.assists,
            StatField::Steals => &self.steals,
            StatField::Blocks => &self.blocks,
            StatField::Turnovers => &self.turnovers,
        }
    }

    fn slot_mut(&mut self, field: StatField) -> &mut Option<f64> {
        match field {
            StatField::FieldGoalMade => &mut self.field_goal_made,
            StatField::FieldGoalAttempted => &mut self.field_goal_attempted,
            StatField::FieldGoalPct => &mut self.field_goal_pct,
            StatField::ThreePtMade => &mut self.three_pt_made,
            StatField::ThreePtAttempted => &mut self.three_pt_attempted,
            StatField::ThreePtPct => &mut self.three_pt_pct,
            StatField::FreeThrowMade => &mut self.free_throw_made,
            StatField::FreeThrowAttempted => &mut self.free_throw_attempted,
            StatField::FreeThrowPct => &mut self.free_throw_pct,
            StatField::TrueShootingPct => &mut self.true_stg_pct,
            StatField::Points => &mut self.points,
            StatField::OffensiveRebounds => &mut self.off_reb,
            StatField::DefensiveRebounds => &mut self.def_reb,
            StatField::TotalRebounds => &mut self.tot_reb,
            StatField::Assists => &mut self.assists,
            StatField::Steals => &mut self.steals,
            StatField::Blocks => &mut self.blocks,
            StatField::Turnovers => &mut self.turnovers,
        }
    }
}
