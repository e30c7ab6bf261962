//! Storage constants and link tags

// LMDB environment defaults
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
pub const DEFAULT_MAX_READERS: u32 = 126;
pub const MAX_DBS: u32 = 5;

// Named databases
pub const DB_ENTITIES: &str = "entities";
pub const DB_LINKS: &str = "links";
pub const DB_LINK_COUNTS: &str = "link_counts";
pub const DB_IDENTIFIERS: &str = "identifiers";
pub const DB_META: &str = "meta";

pub const META_NEXT_ID: &str = "next_id";

// The system principal is never stored, so it takes an id the sequence never hands out.
pub const SYSTEM_PRINCIPAL_ID: u64 = 0;
pub const SYSTEM_IDENTIFIER: &str = "_system";

/// Entity kind tags, first byte of every `entities` key
pub const TAG_PORTFOLIO: u8 = 1;
pub const TAG_PROGRAM: u8 = 2;
pub const TAG_PROJECT: u8 = 3;
pub const TAG_PMO: u8 = 4;
pub const TAG_USER: u8 = 5;

/// A reference from one entity (source) to another (target).
///
/// Every stored reference gets a row in `links` and bumps `link_counts`,
/// so inbound references can be listed by prefix and counted in O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Link {
    PortfolioDirector = 1,
    ProgramPortfolio = 2,
    ProgramDirector = 3,
    ProjectProgram = 4,
    ProjectDirector = 5,
    ProjectSponsor = 6,
    PmoPortfolio = 7,
    PmoDirector = 8,
    UserProject = 9,
}

impl Link {
    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }
}
