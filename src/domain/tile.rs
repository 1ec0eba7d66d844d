/// Cell tags and their properties.
/// Properties are queried via methods, not stored as flags,
/// so cell semantics are centralized here.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CellTag {
    #[default]
    Empty,
    Wall,
    Trap,  // Hidden until revealed, consumed when triggered
    Plate, // Only the active plate of the sequence is ever shown
    Door,  // Blocks until the last plate is pressed
}

impl CellTag {
    /// Decode the numeric tag used by level files.
    pub fn from_code(code: i64) -> Option<CellTag> {
        match code {
            0 => Some(CellTag::Empty),
            1 => Some(CellTag::Wall),
            2 => Some(CellTag::Trap),
            3 => Some(CellTag::Plate),
            4 => Some(CellTag::Door),
            _ => None,
        }
    }

    /// Numeric tag as written in level files.
    #[cfg(test)]
    pub fn code(self) -> u8 {
        match self {
            CellTag::Empty => 0,
            CellTag::Wall => 1,
            CellTag::Trap => 2,
            CellTag::Plate => 3,
            CellTag::Door => 4,
        }
    }

    /// Does this cell stop the player's hitbox?
    pub fn is_blocking(self) -> bool {
        matches!(self, CellTag::Wall | CellTag::Door)
    }

    pub fn is_trap(self) -> bool {
        matches!(self, CellTag::Trap)
    }

    pub fn is_plate(self) -> bool {
        matches!(self, CellTag::Plate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_level_format() {
        for code in 0..=4 {
            let tag = CellTag::from_code(code).unwrap();
            assert_eq!(tag.code() as i64, code);
        }
        assert_eq!(CellTag::from_code(5), None);
        assert_eq!(CellTag::from_code(-1), None);
    }

    #[test]
    fn only_walls_and_doors_block() {
        assert!(CellTag::Wall.is_blocking());
        assert!(CellTag::Door.is_blocking());
        assert!(!CellTag::Empty.is_blocking());
        assert!(!CellTag::Trap.is_blocking());
        assert!(!CellTag::Plate.is_blocking());
    }
}
