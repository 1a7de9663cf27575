//! Mutable context rules.

use std::collections::HashSet;

use tokio::sync::RwLock;

/// The rules a [`RuleBasedContext`] applies per step.
///
/// [`RuleBasedContext`]: super::RuleBasedContext
#[derive(Debug, Clone)]
pub struct ContextRules {
    /// Names of tools that may run without user confirmation.
    pub auto_tools: HashSet<String>,
    /// Whether to prepend the tool catalogue as a system message.
    pub auto_add_tool_instructions: bool,
}

impl Default for ContextRules {
    fn default() -> Self {
        Self {
            auto_tools: HashSet::new(),
            auto_add_tool_instructions: true,
        }
    }
}

impl ContextRules {
    /// Create the default rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a tool to run without confirmation.
    #[must_use]
    pub fn with_auto_tool(mut self, name: impl Into<String>) -> Self {
        self.auto_tools.insert(name.into());
        self
    }

    /// Set whether the tool catalogue is prepended to prompts.
    #[must_use]
    pub const fn with_tool_instructions(mut self, enabled: bool) -> Self {
        self.auto_add_tool_instructions = enabled;
        self
    }

    /// True when the named tool may run without confirmation.
    #[must_use]
    pub fn allows_auto_call(&self, name: &str) -> bool {
        self.auto_tools.contains(name)
    }
}

/// Rules behind a read/write lock.
///
/// A step takes one snapshot at entry and consumes it outside the lock, so
/// concurrent rule updates never produce a torn view within a step.
#[derive(Debug)]
pub struct SharedRules {
    inner: RwLock<ContextRules>,
}

impl Default for SharedRules {
    fn default() -> Self {
        Self::new(ContextRules::default())
    }
}

impl SharedRules {
    /// Wrap rules in a lock.
    #[must_use]
    pub fn new(rules: ContextRules) -> Self {
        Self {
            inner: RwLock::new(rules),
        }
    }

    /// A consistent clone of the current rules.
    pub async fn snapshot(&self) -> ContextRules {
        self.inner.read().await.clone()
    }

    /// Add `enable` to and remove `disable` from the auto-tools set.
    pub async fn update(&self, enable: &[String], disable: &[String]) {
        let mut rules = self.inner.write().await;
        for name in enable {
            rules.auto_tools.insert(name.clone());
        }
        for name in disable {
            rules.auto_tools.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_enables_and_disables() {
        let rules = SharedRules::default();
        rules.update(&["weather".into(), "echo".into()], &[]).await;
        assert!(rules.snapshot().await.allows_auto_call("weather"));

        rules.update(&[], &["weather".into()]).await;
        let snapshot = rules.snapshot().await;
        assert!(!snapshot.allows_auto_call("weather"));
        assert!(snapshot.allows_auto_call("echo"));
    }

    #[test]
    fn test_builder() {
        let rules = ContextRules::new()
            .with_auto_tool("weather")
            .with_tool_instructions(false);
        assert!(rules.allows_auto_call("weather"));
        assert!(!rules.auto_add_tool_instructions);
    }
}
