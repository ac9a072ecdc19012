use arc_swap::ArcSwap;
use log::info;
use std::sync::Arc;

use crate::{domain::track::Track, recommend::RecommendationStrategy};

/// Forwards recommendation requests to the active strategy.
///
/// The strategy can be replaced while other threads are using it; callers
/// that already started keep the strategy they loaded.
pub struct RecommendationEngine {
    strategy: ArcSwap<Box<dyn RecommendationStrategy>>,
}

impl RecommendationEngine {
    pub fn new(strategy: Box<dyn RecommendationStrategy>) -> Self {
        Self {
            strategy: ArcSwap::from_pointee(strategy),
        }
    }

    pub fn get_recommendations(&self, seeds: &[Track], count: usize) -> Vec<Track> {
        self.strategy.load_full().recommend(seeds, count)
    }

    pub fn set_strategy(&self, strategy: Box<dyn RecommendationStrategy>) {
        info!("Switching recommendation strategy to {}", strategy.name());
        self.strategy.store(Arc::new(strategy));
    }

    pub fn strategy_name(&self) -> String {
        self.strategy.load().name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::fake::FakeCatalog,
        domain::track::mock_track,
        recommend::ArtistTopTracks,
    };
    use std::thread;

    struct Fixed(&'static str, usize);

    impl RecommendationStrategy for Fixed {
        fn recommend(&self, _seeds: &[Track], _count: usize) -> Vec<Track> {
            (0..self.1)
                .map(|i| mock_track(&format!("{}-{i}", self.0), "t", &[self.0]))
                .collect()
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_engine_uses_strategy() {
        let catalog = Arc::new(
            FakeCatalog::new()
                .with_artist("Queen", "queen")
                .with_top_tracks("queen", vec![mock_track("1", "Test", &["Queen"])])
                .authenticated(),
        );
        let engine = RecommendationEngine::new(Box::new(ArtistTopTracks::truncating(catalog, "US")));

        let recs = engine.get_recommendations(&[mock_track("1", "Test", &["Queen"])], 5);

        assert_eq!(recs.len(), 1);
        assert_eq!(engine.strategy_name(), "Artist-Based Top Tracks");
    }

    #[test]
    fn test_swap_strategy() {
        let engine = RecommendationEngine::new(Box::new(Fixed("first", 1)));
        engine.set_strategy(Box::new(Fixed("second", 2)));

        assert_eq!(engine.strategy_name(), "second");
        assert_eq!(engine.get_recommendations(&[], 10).len(), 2);
    }

    #[test]
    fn test_concurrent_swap_is_never_observed_half_done() {
        let engine = Arc::new(RecommendationEngine::new(Box::new(Fixed("a", 1))));

        let readers = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let recs = engine.get_recommendations(&[], 0);
                        // each strategy answers with a size matching its own name
                        let expected = if recs[0].artists[0] == "a" { 1 } else { 3 };
                        assert_eq!(recs.len(), expected);
                    }
                })
            })
            .collect::<Vec<_>>();

        for i in 0..1000 {
            if i % 2 == 0 {
                engine.set_strategy(Box::new(Fixed("b", 3)));
            } else {
                engine.set_strategy(Box::new(Fixed("a", 1)));
            }
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
