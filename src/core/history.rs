use crate::core::state::{GenerationResult, Persona};

/// Results of the current session, most recent first. Lives only in memory.
#[derive(Debug, Default, Clone)]
pub struct SessionHistory {
    entries: Vec<GenerationResult>,
    active_id: Option<i64>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts at the front and makes the new entry active.
    pub fn push(&mut self, result: GenerationResult) {
        self.active_id = Some(result.id);
        self.entries.insert(0, result);
    }

    /// Activates an entry and hands back its persona snapshot.
    pub fn select(&mut self, id: i64) -> Option<&Persona> {
        let index = self.entries.iter().position(|r| r.id == id)?;
        self.active_id = Some(id);
        Some(&self.entries[index].persona)
    }

    pub fn get(&self, id: i64) -> Option<&GenerationResult> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub fn active(&self) -> Option<&GenerationResult> {
        self.active_id.and_then(|id| self.get(id))
    }

    pub fn active_id(&self) -> Option<i64> {
        self.active_id
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.active_id = None;
    }

    pub fn entries(&self) -> &[GenerationResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: i64, name: &str) -> GenerationResult {
        GenerationResult {
            id,
            name: name.to_string(),
            date: "12:00:00".to_string(),
            images: vec![],
            audio_base64: None,
            used_prompt: format!("prompt {}", id),
            persona: Persona {
                name: name.to_string(),
                ..Persona::default()
            },
        }
    }

    #[test]
    fn test_push_orders_most_recent_first() {
        let mut h = SessionHistory::new();
        h.push(result(1, "a"));
        h.push(result(2, "b"));
        h.push(result(3, "c"));

        let ids: Vec<i64> = h.entries().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(h.active_id(), Some(3));
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn test_select_returns_snapshot() {
        let mut h = SessionHistory::new();
        h.push(result(1, "first"));
        h.push(result(2, "second"));

        let persona = h.select(1).cloned();
        assert_eq!(persona.map(|p| p.name), Some("first".to_string()));
        assert_eq!(h.active().map(|r| r.id), Some(1));
    }

    #[test]
    fn test_select_unknown_keeps_state() {
        let mut h = SessionHistory::new();
        h.push(result(1, "only"));
        assert!(h.select(99).is_none());
        assert_eq!(h.active_id(), Some(1));
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut h = SessionHistory::new();
        h.push(result(1, "a"));
        h.push(result(2, "b"));
        h.clear();

        assert!(h.is_empty());
        assert!(h.active().is_none());
        assert!(h.active_id().is_none());
    }
}
