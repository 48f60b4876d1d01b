//! The site path stack and per-level decorator counters.
//!
//! Site path format is bit-exact — it feeds the site HMAC:
//! segments joined by `/`, root rendered as `root`, decorator segments
//! as `@name[idx]` with a 0-based per-name per-level counter, and the
//! parameter suffix `/params/<param>`.

use std::collections::HashMap;

/// Index returned by `push` for non-decorator segments.
pub(crate) const NOT_A_DECORATOR: i32 = -1;

pub(crate) struct PathStack {
    /// Rendered segments, `root` first.
    segments: Vec<String>,
    /// Child decorator counters, one map per stack level.
    counts: Vec<HashMap<String, i32>>,
}

impl PathStack {
    pub(crate) fn new() -> Self {
        Self {
            segments: vec!["root".to_owned()],
            counts: vec![HashMap::new()],
        }
    }

    /// Push a segment. Decorator names (leading `@`) are rendered
    /// `@name[idx]` and the per-level index is returned; anything else
    /// renders verbatim and returns [`NOT_A_DECORATOR`].
    pub(crate) fn push(&mut self, name: &str) -> i32 {
        let (rendered, index) = if name.starts_with('@') {
            let counter = self
                .counts
                .last_mut()
                .expect("counts stack tracks the segment stack")
                .entry(name.to_owned())
                .or_insert(0);
            let index = *counter;
            *counter += 1;
            (format!("{name}[{index}]"), index)
        } else {
            (name.to_owned(), NOT_A_DECORATOR)
        };
        self.segments.push(rendered);
        self.counts.push(HashMap::new());
        index
    }

    /// Pop the top segment.
    ///
    /// # Panics
    ///
    /// Popping the root segment is a programmer error.
    pub(crate) fn pop(&mut self) {
        if self.segments.len() == 1 {
            panic!("invariant violation: pop of root path segment");
        }
        self.segments.pop();
        self.counts.pop();
    }

    /// Zero every decorator counter. Called by the planner at step
    /// boundaries so sibling decorator instances restart at `[0]`.
    pub(crate) fn reset_counts(&mut self) {
        for level in &mut self.counts {
            level.clear();
        }
    }

    /// Canonical site path for a parameter at the current position.
    pub(crate) fn site(&self, param_name: &str) -> String {
        format!("{}/params/{}", self.segments.join("/"), param_name)
    }

    /// Cumulative variable-scope paths, root-first: the rendered
    /// segments with step segments (non-root, non-decorator) removed.
    pub(crate) fn scope_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut path = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            let in_scope = i == 0 || seg.starts_with('@');
            if !in_scope {
                continue;
            }
            if path.is_empty() {
                path = seg.clone();
            } else {
                path = format!("{path}/{seg}");
            }
            chain.push(path.clone());
        }
        chain
    }

    /// The current variable scope path (last entry of the chain).
    pub(crate) fn scope_path(&self) -> String {
        self.scope_chain()
            .pop()
            .expect("chain always contains root")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_steps_verbatim_and_counts_decorators() {
        let mut p = PathStack::new();
        assert_eq!(p.push("step-1"), NOT_A_DECORATOR);
        assert_eq!(p.push("@shell"), 0);
        assert_eq!(
            p.site("command"),
            "root/step-1/@shell[0]/params/command"
        );
    }

    #[test]
    fn sibling_decorators_count_per_name_per_level() {
        let mut p = PathStack::new();
        p.push("step-1");
        assert_eq!(p.push("@shell"), 0);
        p.pop();
        assert_eq!(p.push("@timeout"), 0);
        p.pop();
        assert_eq!(p.push("@shell"), 1);
        assert_eq!(p.site("command"), "root/step-1/@shell[1]/params/command");
    }

    #[test]
    fn nested_levels_have_independent_counters() {
        let mut p = PathStack::new();
        p.push("step-1");
        p.push("@retry");
        assert_eq!(p.push("@shell"), 0);
        p.pop();
        p.pop();
        assert_eq!(p.push("@shell"), 0);
    }

    #[test]
    fn reset_counts_restarts_indices() {
        let mut p = PathStack::new();
        p.push("step-1");
        p.push("@shell");
        p.pop();
        p.pop();
        p.reset_counts();
        p.push("step-2");
        assert_eq!(p.push("@shell"), 0);
    }

    #[test]
    fn scope_chain_excludes_step_segments() {
        let mut p = PathStack::new();
        p.push("step-1");
        p.push("@retry");
        assert_eq!(
            p.scope_chain(),
            vec!["root".to_owned(), "root/@retry[0]".to_owned()]
        );
        assert_eq!(p.scope_path(), "root/@retry[0]");
    }

    #[test]
    #[should_panic(expected = "pop of root")]
    fn popping_root_panics() {
        let mut p = PathStack::new();
        p.pop();
    }
}
