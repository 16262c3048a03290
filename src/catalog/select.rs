//! Episode selector - picks the next episode of a series to unlock.

use super::EpisodeCatalog;
use crate::domain::{Episode, Series};
use crate::error::Result;

impl EpisodeCatalog<'_> {
    /// Oldest restricted episode of `series`.
    ///
    /// Candidates are `advance` episodes whose title contains the series'
    /// search term (case-insensitive) and that have an episode number. The
    /// lowest number wins; equal numbers keep store order (lowest ID first).
    /// `None` means there is nothing to unlock, which is not an error.
    pub fn select_next_episode(&self, series: &Series) -> Result<Option<Episode>> {
        let needle = series.effective_search_term().to_lowercase();

        let mut candidates: Vec<Episode> = self
            .advance_episodes()?
            .into_iter()
            .filter(|e| e.episode_number.is_some() && e.title.to_lowercase().contains(&needle))
            .collect();

        log::debug!(
            "Series '{}' (term '{}'): {} advance candidate(s)",
            series.title,
            needle,
            candidates.len()
        );

        candidates.sort_by_key(|e| e.episode_number);
        Ok(candidates.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::EpisodeCatalog;
    use crate::catalog::test_support::seed_episode;
    use crate::config::FieldsConfig;
    use crate::domain::{AccessTier, Series};
    use crate::storage::SqliteStore;

    #[test]
    fn test_selects_lowest_number() {
        let store = SqliteStore::open_in_memory().unwrap();
        let fields = FieldsConfig::default();
        for n in [12, 5, 8] {
            seed_episode(&store, &fields, &format!("Tower Episode {}", n), Some(n), AccessTier::Advance, None);
        }

        let catalog = EpisodeCatalog::new(&store, &fields);
        let picked = catalog.select_next_episode(&Series::new(1, "Tower")).unwrap().unwrap();
        assert_eq!(picked.episode_number, Some(5));
    }

    #[test]
    fn test_ignores_free_unnumbered_and_other_series() {
        let store = SqliteStore::open_in_memory().unwrap();
        let fields = FieldsConfig::default();
        seed_episode(&store, &fields, "Tower Episode 1", Some(1), AccessTier::Free, None);
        seed_episode(&store, &fields, "Tower Episode 2", None, AccessTier::Advance, None);
        seed_episode(&store, &fields, "Dawn Episode 3", Some(3), AccessTier::Advance, None);
        let want = seed_episode(&store, &fields, "TOWER Episode 4", Some(4), AccessTier::Advance, None);

        let catalog = EpisodeCatalog::new(&store, &fields);
        let picked = catalog.select_next_episode(&Series::new(1, "tower")).unwrap().unwrap();
        assert_eq!(picked.id, want);
    }

    #[test]
    fn test_search_term_override() {
        let store = SqliteStore::open_in_memory().unwrap();
        let fields = FieldsConfig::default();
        let want = seed_episode(&store, &fields, "SGB Chapter 40", Some(40), AccessTier::Advance, None);

        let catalog = EpisodeCatalog::new(&store, &fields);
        let series = Series::new(1, "Surviving Game Barbarian");
        assert_eq!(catalog.select_next_episode(&series).unwrap(), None);

        let series = series.with_search_term(Some("SGB".to_string()));
        assert_eq!(catalog.select_next_episode(&series).unwrap().map(|e| e.id), Some(want));
    }

    #[test]
    fn test_tie_keeps_lowest_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let fields = FieldsConfig::default();
        let first = seed_episode(&store, &fields, "Tower Episode 5", Some(5), AccessTier::Advance, None);
        seed_episode(&store, &fields, "Tower Episode 5 (redux)", Some(5), AccessTier::Advance, None);

        let catalog = EpisodeCatalog::new(&store, &fields);
        let picked = catalog.select_next_episode(&Series::new(1, "Tower")).unwrap().unwrap();
        assert_eq!(picked.id, first);
    }

    #[test]
    fn test_none_when_nothing_matches() {
        let store = SqliteStore::open_in_memory().unwrap();
        let fields = FieldsConfig::default();
        let catalog = EpisodeCatalog::new(&store, &fields);
        assert_eq!(catalog.select_next_episode(&Series::new(1, "Tower")).unwrap(), None);
    }
}
