use super::TransactionError;

/// Longest savepoint name accepted by both backend families
const MAX_NAME_LEN: usize = 64;

/// One named checkpoint inside the open transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavepointFrame {
    pub name: String,
    /// Position in the stack; the root transaction is depth 0
    pub depth: usize,
}

/// LIFO stack of savepoints owned by one isolation manager
#[derive(Debug, Default)]
pub struct SavepointStack {
    frames: Vec<SavepointFrame>,
    generated: u64,
}

impl SavepointStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a caller-supplied name or generate a fresh one.
    ///
    /// Nothing is pushed; the caller pushes once the backend accepted the
    /// savepoint.
    pub fn reserve_name(&mut self, requested: Option<&str>) -> Result<String, TransactionError> {
        match requested {
            Some(name) => {
                validate_name(name)?;
                if self.contains(name) {
                    return Err(TransactionError::DuplicateSavepoint {
                        name: name.to_string(),
                    });
                }
                Ok(name.to_string())
            }
            None => loop {
                self.generated += 1;
                let candidate = if self.frames.is_empty() {
                    format!("sandbox_root_{}", self.generated)
                } else {
                    format!("sandbox_sp_{}", self.generated)
                };
                if !self.contains(&candidate) {
                    return Ok(candidate);
                }
            },
        }
    }

    /// Push a frame whose name came from [`reserve_name`](Self::reserve_name)
    pub fn push(&mut self, name: String) -> &SavepointFrame {
        let depth = self.frames.len();
        self.frames.push(SavepointFrame { name, depth });
        &self.frames[depth]
    }

    pub fn pop(&mut self) -> Option<SavepointFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&SavepointFrame> {
        self.frames.last()
    }

    pub fn root(&self) -> Option<&SavepointFrame> {
        self.frames.first()
    }

    pub fn find(&self, name: &str) -> Option<&SavepointFrame> {
        self.frames.iter().find(|frame| frame.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Discard every frame deeper than `depth`, returning how many went
    pub fn truncate_above(&mut self, depth: usize) -> usize {
        let keep = (depth + 1).min(self.frames.len());
        let discarded = self.frames.len() - keep;
        self.frames.truncate(keep);
        discarded
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[SavepointFrame] {
        &self.frames
    }
}

/// Savepoint names end up inside SQL text, so only plain identifiers pass
fn validate_name(name: &str) -> Result<(), TransactionError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= MAX_NAME_LEN {
        Ok(())
    } else {
        Err(TransactionError::InvalidSavepointName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    include!("stack.test.rs");
}
