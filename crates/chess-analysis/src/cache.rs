//! Bounded analysis cache keyed by (position, move).

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::quality::MoveAnalysis;

/// Identifies one move played from one position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// FEN of the position before the move
    pub position: String,
    /// Move in UCI notation
    pub mv: String,
}

impl CacheKey {
    pub fn new(position: impl Into<String>, mv: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            mv: mv.into(),
        }
    }
}

struct Entries {
    map: HashMap<CacheKey, MoveAnalysis>,
    order: VecDeque<CacheKey>,
}

/// Thread-safe cache of finished move analyses.
///
/// Holds at most `capacity` entries and evicts the oldest-inserted one
/// first. Concurrent writers of the same key are allowed; the last one wins.
pub struct AnalysisCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // entries stay consistent even if a holder panicked mid-read
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<MoveAnalysis> {
        self.lock().map.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, analysis: MoveAnalysis) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.lock();
        if entries.map.insert(key.clone(), analysis).is_none() {
            entries.order.push_back(key);
        }

        while entries.map.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
        }
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.map.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Side;
    use crate::material::{BoardDescriptor, GamePhase, TacticalPatterns};
    use crate::quality::{AnalysisStatus, MoveQuality};

    fn analysis(mv: &str, cp_loss: i32) -> MoveAnalysis {
        MoveAnalysis {
            index: 0,
            played_move: mv.to_string(),
            side: Side::White,
            position: "startpos".to_string(),
            best_move: Some(mv.to_string()),
            eval_before: 20,
            eval_after: 20 - cp_loss,
            white_eval_after: 20 - cp_loss,
            cp_loss,
            eval_delta: cp_loss,
            material_loss: 0,
            matched_best: true,
            alternatives: Vec::new(),
            board: BoardDescriptor {
                white_pieces: 16,
                black_pieces: 16,
                material_balance: 0,
                phase: GamePhase::Opening,
                tactical: false,
            },
            patterns: TacticalPatterns::default(),
            quality: MoveQuality::Best,
            win_prob_loss: 0.0,
            complexity: 0,
            depth: 14,
            status: AnalysisStatus::Complete,
            error: None,
        }
    }

    #[test]
    fn lookups_match_the_full_key() {
        let cache = AnalysisCache::new(10);
        cache.insert(CacheKey::new("fen-a", "e2e4"), analysis("e2e4", 0));

        assert!(cache.get(&CacheKey::new("fen-a", "e2e4")).is_some());
        assert!(cache.get(&CacheKey::new("fen-a", "d2d4")).is_none());
        assert!(cache.get(&CacheKey::new("fen-b", "e2e4")).is_none());
    }

    #[test]
    fn evicts_oldest_inserted_first() {
        let cache = AnalysisCache::new(2);
        cache.insert(CacheKey::new("a", "m"), analysis("m", 1));
        cache.insert(CacheKey::new("b", "m"), analysis("m", 2));
        // rewriting an existing key does not refresh its age
        cache.insert(CacheKey::new("a", "m"), analysis("m", 3));
        cache.insert(CacheKey::new("c", "m"), analysis("m", 4));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&CacheKey::new("a", "m")).is_none());
        assert_eq!(cache.get(&CacheKey::new("b", "m")).unwrap().cp_loss, 2);
        assert_eq!(cache.get(&CacheKey::new("c", "m")).unwrap().cp_loss, 4);
    }

    #[test]
    fn last_writer_wins() {
        let cache = AnalysisCache::new(4);
        cache.insert(CacheKey::new("a", "m"), analysis("m", 5));
        cache.insert(CacheKey::new("a", "m"), analysis("m", 7));
        assert_eq!(cache.get(&CacheKey::new("a", "m")).unwrap().cp_loss, 7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_empties_cache() {
        let cache = AnalysisCache::new(4);
        cache.insert(CacheKey::new("a", "m"), analysis("m", 0));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = AnalysisCache::new(0);
        cache.insert(CacheKey::new("a", "m"), analysis("m", 0));
        assert!(cache.is_empty());
    }
}
