use serde::Serialize;

/// Named views over the statistics payload.
///
/// The payload's `Data` array is positional and undocumented upstream.
/// This enum is the only place the block positions are written down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsView {
    GeneralStats,
    AgeDistribution,
    PopulationForecast,
    Education,
    MaritalStatus,
    Language,
    Income,
    ChildrenAtHome,
    RentOrOwned,
    AgeOfHomeDistribution,
    Occupations,
}

impl StatsView {
    pub const ALL: [StatsView; 11] = [
        StatsView::GeneralStats,
        StatsView::AgeDistribution,
        StatsView::PopulationForecast,
        StatsView::Education,
        StatsView::MaritalStatus,
        StatsView::Language,
        StatsView::Income,
        StatsView::ChildrenAtHome,
        StatsView::RentOrOwned,
        StatsView::AgeOfHomeDistribution,
        StatsView::Occupations,
    ];

    /// Position of the view's block in `Data`. Index 1 is unused.
    pub fn index(self) -> usize {
        match self {
            StatsView::GeneralStats => 0,
            StatsView::AgeDistribution => 2,
            StatsView::PopulationForecast => 3,
            StatsView::Education => 4,
            StatsView::MaritalStatus => 5,
            StatsView::Language => 6,
            StatsView::Income => 7,
            StatsView::ChildrenAtHome => 8,
            StatsView::RentOrOwned => 9,
            StatsView::AgeOfHomeDistribution => 10,
            StatsView::Occupations => 11,
        }
    }

    pub fn coerce_to_int(self) -> bool {
        matches!(
            self,
            StatsView::AgeDistribution
                | StatsView::Language
                | StatsView::Income
                | StatsView::Occupations
        )
    }

    pub fn sort_descending(self) -> bool {
        matches!(self, StatsView::Language | StatsView::Occupations)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatsView::GeneralStats => "general stats",
            StatsView::AgeDistribution => "age distribution",
            StatsView::PopulationForecast => "population forecast",
            StatsView::Education => "education",
            StatsView::MaritalStatus => "marital status",
            StatsView::Language => "language",
            StatsView::Income => "income",
            StatsView::ChildrenAtHome => "children at home",
            StatsView::RentOrOwned => "rent or owned",
            StatsView::AgeOfHomeDistribution => "age of home distribution",
            StatsView::Occupations => "occupations",
        }
    }
}

impl std::fmt::Display for StatsView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
