use serde::{Deserialize, Serialize};

/// Category of a hair group. Groups of the same type share hair shadow maps
/// and are batched together by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HairType {
    Scalp,
    Brows,
    Lashes,
    Beard,
    Fur,
}

impl HairType {
    pub const ALL: [HairType; 5] = [
        HairType::Scalp,
        HairType::Brows,
        HairType::Lashes,
        HairType::Beard,
        HairType::Fur,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            HairType::Scalp => "scalp",
            HairType::Brows => "brows",
            HairType::Lashes => "lashes",
            HairType::Beard => "beard",
            HairType::Fur => "fur",
        }
    }
}
