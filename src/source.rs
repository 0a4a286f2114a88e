use std::sync::Mutex;

/// A finite, non-restartable sequence of candidates, safe for concurrent
/// pull. Each candidate is handed out exactly once.
pub trait CandidateSource: Send + Sync {
    /// Pull the next candidate, or `None` once the sequence is exhausted.
    fn next_candidate(&self) -> Option<String>;

    /// Total candidate count, when known up front.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

/// Candidate source backed by an already-loaded wordlist.
#[derive(Debug)]
pub struct WordlistSource {
    candidates: Mutex<std::vec::IntoIter<String>>,
    total: usize,
}

impl WordlistSource {
    pub fn new(candidates: Vec<String>) -> Self {
        let total = candidates.len();
        Self {
            candidates: Mutex::new(candidates.into_iter()),
            total,
        }
    }
}

impl CandidateSource for WordlistSource {
    fn next_candidate(&self) -> Option<String> {
        self.candidates.lock().unwrap().next()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.total)
    }
}
