use std::sync::{Arc, RwLock};

/// Answers whether a submission key is currently present and usable.
pub trait CredentialSource: Send + Sync {
    fn has_valid_key(&self) -> bool;
}

/// Submission key shared between the worker and whoever manages the key.
#[derive(Debug, Clone, Default)]
pub struct SharedCredential {
    key: Arc<RwLock<Option<String>>>,
}

impl SharedCredential {
    pub fn new(key: Option<String>) -> Self {
        let credential = Self::default();
        credential.set(key);
        credential
    }

    pub fn set(&self, key: Option<String>) {
        let key = key
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        match self.key.write() {
            Ok(mut slot) => *slot = key,
            Err(poisoned) => *poisoned.into_inner() = key,
        }
    }

    pub fn clear(&self) {
        self.set(None);
    }
}

impl CredentialSource for SharedCredential {
    fn has_valid_key(&self) -> bool {
        match self.key.read() {
            Ok(slot) => slot.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CredentialSource, SharedCredential};

    #[test]
    fn blank_keys_are_not_valid() {
        let credential = SharedCredential::new(Some("   ".to_string()));
        assert!(!credential.has_valid_key());

        let handle = credential.clone();
        handle.set(Some("abc123".to_string()));
        assert!(credential.has_valid_key());

        handle.clear();
        assert!(!credential.has_valid_key());
    }
}
