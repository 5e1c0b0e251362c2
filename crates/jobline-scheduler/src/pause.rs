use std::collections::HashSet;

use jobline_core::PauseToken;
use tracing::debug;

/// Reference-counted pause state: paused while any token is outstanding.
#[derive(Debug, Default)]
pub struct PauseController {
    tokens: HashSet<PauseToken>,
}

impl PauseController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pause request, generating a token when none is given.
    /// Pausing twice with the same token counts once.
    pub fn pause(&mut self, token: Option<PauseToken>) -> PauseToken {
        let token = token.unwrap_or_default();
        if !self.tokens.insert(token.clone()) {
            debug!(%token, "pause token already held");
        }
        token
    }

    /// Drop one token, or every token when `token` is `None`.
    ///
    /// Returns `true` when no tokens remain afterwards. Releasing a token that
    /// is not held is harmless.
    pub fn resume(&mut self, token: Option<&PauseToken>) -> bool {
        match token {
            Some(token) => {
                if !self.tokens.remove(token) {
                    debug!(%token, "resume with unknown pause token");
                }
            }
            None => self.tokens.clear(),
        }
        self.tokens.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Outstanding tokens, in no particular order.
    pub fn tokens(&self) -> Vec<PauseToken> {
        self.tokens.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}
