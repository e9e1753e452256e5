use crate::types::StoreItem;

/// Numeric columns of a store listing that ships can be ranked by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreStat {
    Price,
    MaxHp,
    ShotDamage,
    ShotRange,
    ShotsPerTurn,
    UnitsPerTurn,
}

impl StoreStat {
    pub fn value(self, item: &StoreItem) -> i64 {
        match self {
            Self::Price => item.price,
            Self::MaxHp => item.max_hp,
            Self::ShotDamage => item.shot_damage,
            Self::ShotRange => i64::from(item.shot_range),
            Self::ShotsPerTurn => i64::from(item.shots_per_turn),
            Self::UnitsPerTurn => i64::from(item.units_per_turn),
        }
    }
}

/// Lowest value of `stat`; the earliest listing wins a tie.
pub fn min_by_stat(items: &[StoreItem], stat: StoreStat) -> Option<&StoreItem> {
    items.iter().fold(None, |best, item| match best {
        Some(current) if stat.value(current) <= stat.value(item) => Some(current),
        _ => Some(item),
    })
}

/// Highest value of `stat`; the earliest listing wins a tie.
pub fn max_by_stat(items: &[StoreItem], stat: StoreStat) -> Option<&StoreItem> {
    items.iter().fold(None, |best, item| match best {
        Some(current) if stat.value(current) >= stat.value(item) => Some(current),
        _ => Some(item),
    })
}

pub fn cheapest(items: &[StoreItem]) -> Option<&StoreItem> {
    min_by_stat(items, StoreStat::Price)
}

pub fn most_expensive(items: &[StoreItem]) -> Option<&StoreItem> {
    max_by_stat(items, StoreStat::Price)
}

pub fn weakest(items: &[StoreItem]) -> Option<&StoreItem> {
    min_by_stat(items, StoreStat::MaxHp)
}

pub fn strongest(items: &[StoreItem]) -> Option<&StoreItem> {
    max_by_stat(items, StoreStat::MaxHp)
}

pub fn longest_range(items: &[StoreItem]) -> Option<&StoreItem> {
    max_by_stat(items, StoreStat::ShotRange)
}

pub fn fastest(items: &[StoreItem]) -> Option<&StoreItem> {
    max_by_stat(items, StoreStat::UnitsPerTurn)
}
