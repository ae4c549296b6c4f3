//! Name ambiguity and command line completion.

use crate::parser::{is_partial_name, split_name, strip_prompt};
use crate::range::parse_range;
use crate::{CmdHost, Commands};

impl<H: CmdHost> Commands<H> {
    /// Whether more than one full command name starts with `prefix`.
    pub fn is_ambiguous(&self, prefix: &str) -> bool {
        self.registry.names_with_prefix(prefix).nth(1).is_some()
    }

    /// Completion candidates for `line` and the byte offset in `line` they
    /// replace from.
    ///
    /// While the name is still being typed the candidates are command
    /// names. After it, the host completes the arguments.
    pub fn complete_cmd(&self, host: &mut H, line: &str) -> (Vec<String>, usize) {
        let Ok((_, rest)) = parse_range(strip_prompt(line), host) else {
            return (Vec::new(), 0);
        };
        let name_start = line.len() - rest.len();
        if is_partial_name(rest) {
            let names = self
                .registry
                .names_with_prefix(rest)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            return (names, name_start);
        }

        let (typed, tail) = split_name(rest, |name| self.registry.contains(name));
        let Some(id) = self.registry.find(typed).map(|reg| reg.desc.id) else {
            return (Vec::new(), name_start);
        };
        let tail_start = line.len() - tail.len();
        let (candidates, offset) = host.complete_args(id, tail);
        (candidates, tail_start + offset)
    }
}
