//! Keys: per-mode tries plus the dispatch state machine.
//!
//! Dispatch of one top-level chord:
//! * optional `"x` register prefix (modes with `USES_REGS`);
//! * optional count, digits not starting with `0` (modes with `USES_COUNT`);
//! * trie walk. A `Multikey` node swallows the next key verbatim before any
//!   edge is consulted. Edges win over a `Selector` follow-up, so `dd` can
//!   coexist with a `d` operator.
//! * a miss below the root runs the deepest bound node on the consumed
//!   prefix and the rest is dispatched again from the top.

use tracing::{debug, trace, warn};

use crate::trie::{FollowedBy, KeyBinding, KeyCmd, KeyHandler, KeyTrie, SelectorRole};
use crate::{KeyInfo, KeyOutcome, KeysError, KeysInfo, ModeFlags};

/// Ceiling on nested re-entry through user mappings.
pub const MAX_KEY_RECURSION: usize = 16;

const MAX_COUNT: u32 = 999_999;

/// Host side of key dispatch.
pub trait KeysHost {
    /// Index of the active mode.
    fn mode(&self) -> usize;
}

/// Handler for keys that match nothing at the root of a mode.
pub type DefaultHandler<H> = fn(&mut H, char) -> i32;

pub struct ModeConf<H> {
    pub flags: ModeFlags,
    pub default_handler: Option<DefaultHandler<H>>,
}

impl<H> ModeConf<H> {
    pub fn new(flags: ModeFlags) -> Self {
        Self {
            flags,
            default_handler: None,
        }
    }

    pub fn with_default(mut self, handler: DefaultHandler<H>) -> Self {
        self.default_handler = Some(handler);
        self
    }
}

struct ModeSlot<H> {
    conf: ModeConf<H>,
    trie: KeyTrie<H>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Flow {
    timed_out: bool,
    depth: usize,
}

pub struct Keys<H> {
    modes: Vec<ModeSlot<H>>,
}

impl<H: KeysHost> Keys<H> {
    pub fn new(modes: Vec<ModeConf<H>>) -> Self {
        Self {
            modes: modes
                .into_iter()
                .map(|conf| ModeSlot {
                    conf,
                    trie: KeyTrie::new(),
                })
                .collect(),
        }
    }

    pub fn mode_count(&self) -> usize {
        self.modes.len()
    }

    pub fn trie(&self, mode: usize) -> Option<&KeyTrie<H>> {
        self.modes.get(mode).map(|slot| &slot.trie)
    }

    // ---------------------------------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------------------------------

    /// Binds `keys` in `mode` to a native handler, overwriting any previous
    /// descriptor. The returned binding can be refined in place.
    pub fn add_keys(
        &mut self,
        keys: &str,
        mode: usize,
        handler: KeyHandler<H>,
    ) -> Result<&mut KeyBinding<H>, KeysError> {
        let trie = self.trie_mut(keys, mode)?;
        let node = trie.insert_path(keys);
        if trie.set_binding(node, KeyBinding::native(handler)).is_some() {
            trace!(target: "keys.map", keys, mode, "binding_override");
        }
        trie.binding_mut(node).ok_or(KeysError::EmptySequence)
    }

    /// Maps `keys` to `rhs`. Fails when `keys` is bound to a native handler
    /// that was not registered as remappable.
    pub fn add_user_keys(&mut self, keys: &str, rhs: &str, mode: usize) -> Result<(), KeysError> {
        let trie = self.trie_mut(keys, mode)?;
        if let Some(node) = trie.find(keys)
            && let Some(existing) = trie.binding(node)
            && !existing.is_user()
            && !existing.remappable
        {
            debug!(target: "keys.map", keys, mode, "remap_rejected_native");
            return Err(KeysError::NativeBinding(keys.to_string()));
        }
        let node = trie.insert_path(keys);
        trie.shadow(node, KeyBinding::user(rhs));
        debug!(target: "keys.map", keys, rhs, mode, "user_keys_added");
        Ok(())
    }

    pub fn remove_user_keys(&mut self, keys: &str, mode: usize) -> Result<(), KeysError> {
        let trie = self.trie_mut(keys, mode)?;
        match trie.remove_user(keys) {
            Some(_) => {
                debug!(target: "keys.map", keys, mode, "user_keys_removed");
                Ok(())
            }
            None => Err(KeysError::NotMapped(keys.to_string())),
        }
    }

    pub fn has_user_keys(&self, keys: &str, mode: usize) -> bool {
        self.trie(mode)
            .and_then(|trie| trie.find(keys).and_then(|node| trie.binding(node)))
            .is_some_and(KeyBinding::is_user)
    }

    /// `(lhs, rhs)` pairs of every user mapping in `mode`, sorted by lhs.
    pub fn list_user_keys(&self, mode: usize) -> Vec<(String, String)> {
        let Some(trie) = self.trie(mode) else {
            return Vec::new();
        };
        trie.bindings()
            .into_iter()
            .filter_map(|(lhs, binding)| match &binding.cmd {
                KeyCmd::User(rhs) => Some((lhs, rhs.clone())),
                KeyCmd::Native(_) => None,
            })
            .collect()
    }

    pub fn clear_user_keys(&mut self) {
        for slot in &mut self.modes {
            let user: Vec<String> = slot
                .trie
                .bindings()
                .into_iter()
                .filter(|(_, b)| b.is_user())
                .map(|(lhs, _)| lhs)
                .collect();
            for lhs in user {
                slot.trie.remove_user(&lhs);
            }
        }
    }

    /// Drops every binding of every mode.
    pub fn reset(&mut self) {
        for slot in &mut self.modes {
            slot.trie.clear();
        }
    }

    fn trie_mut(&mut self, keys: &str, mode: usize) -> Result<&mut KeyTrie<H>, KeysError> {
        if keys.is_empty() {
            return Err(KeysError::EmptySequence);
        }
        self.modes
            .get_mut(mode)
            .map(|slot| &mut slot.trie)
            .ok_or(KeysError::InvalidMode(mode))
    }

    // ---------------------------------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------------------------------

    pub fn execute_keys(&self, host: &mut H, keys: &str) -> KeyOutcome {
        self.execute_keys_partial(host, keys).0
    }

    /// Like [`Keys::execute_keys`], also returning how many trailing keys
    /// are still pending. Chords before them already ran, so a host that
    /// buffers input keeps only that suffix.
    pub fn execute_keys_partial(&self, host: &mut H, keys: &str) -> (KeyOutcome, usize) {
        let keys: Vec<char> = keys.chars().collect();
        let mut info = KeysInfo::default();
        let (outcome, pending) = self.execute_chars(host, &keys, &mut info, Flow::default());
        debug!(target: "keys.dispatch", len = keys.len(), pending, ?outcome, "execute_keys");
        (outcome, pending)
    }

    /// Like [`Keys::execute_keys`], for a buffer whose chord timeout expired:
    /// a bound prefix that also starts longer chords runs instead of waiting.
    pub fn execute_keys_timed_out(&self, host: &mut H, keys: &str) -> KeyOutcome {
        let keys: Vec<char> = keys.chars().collect();
        let mut info = KeysInfo {
            after_wait: true,
            ..KeysInfo::default()
        };
        let flow = Flow {
            timed_out: true,
            depth: 0,
        };
        let (outcome, _) = self.execute_chars(host, &keys, &mut info, flow);
        debug!(target: "keys.dispatch", len = keys.len(), ?outcome, "execute_keys_timed_out");
        outcome
    }

    /// Runs chords from `keys` until one fails, waits or the input ends.
    /// The second value counts the keys left pending by a wait: the chord
    /// that is waiting and everything after it.
    fn execute_chars(
        &self,
        host: &mut H,
        mut keys: &[char],
        info: &mut KeysInfo,
        flow: Flow,
    ) -> (KeyOutcome, usize) {
        if keys.is_empty() {
            return (KeyOutcome::Unknown, 0);
        }
        loop {
            let (outcome, consumed) = self.execute_step(host, keys, info, flow);
            if outcome.is_wait() {
                return (outcome, keys.len());
            }
            if !outcome.is_ok() || consumed >= keys.len() {
                return (outcome, 0);
            }
            keys = &keys[consumed..];
            trace!(target: "keys.dispatch", rest = keys.len(), "redispatch_remainder");
            if !info.selector {
                info.indexes.clear();
            }
        }
    }

    /// Dispatches one chord from the start of `keys`, returning the outcome
    /// and how many keys it used.
    fn execute_step(
        &self,
        host: &mut H,
        keys: &[char],
        info: &mut KeysInfo,
        flow: Flow,
    ) -> (KeyOutcome, usize) {
        let mode = host.mode();
        let Some(slot) = self.modes.get(mode) else {
            warn!(target: "keys.dispatch", mode, "invalid_mode");
            return (KeyOutcome::Unknown, keys.len());
        };
        let flags = slot.conf.flags;
        let pending = (Self::wait(flags, flow), keys.len());
        let mut key_info = KeyInfo::default();
        let mut pos = 0;

        if flags.contains(ModeFlags::USES_REGS) && !info.selector && keys[0] == '"' {
            match keys.get(1) {
                Some(&reg) => {
                    key_info.register = Some(reg);
                    pos = 2;
                }
                None => return pending,
            }
        }
        if flags.contains(ModeFlags::USES_COUNT) {
            let (count, used) = parse_count(&keys[pos..]);
            key_info.count = count;
            pos += used;
        }
        if pos == keys.len() {
            return pending;
        }

        let trie = &slot.trie;
        let mut node = KeyTrie::<H>::ROOT;
        let mut i = pos;
        while i < keys.len() {
            let bound = (node != KeyTrie::<H>::ROOT)
                .then(|| trie.binding(node))
                .flatten();
            if let Some(binding) = bound
                && binding.followed == FollowedBy::Multikey
            {
                key_info.multi = Some(keys[i]);
                trace!(target: "keys.dispatch", param = %keys[i], "multikey_captured");
                return (self.run_cmd(host, binding, key_info, info, flow), i + 1);
            }
            match trie.child(node, keys[i]) {
                Some(next) => {
                    trace!(target: "keys.dispatch", step = i, key = %keys[i], node = next, "advance");
                    node = next;
                    i += 1;
                }
                None if node == KeyTrie::<H>::ROOT => {
                    if info.selector {
                        return (KeyOutcome::Unknown, i);
                    }
                    return match slot.conf.default_handler {
                        Some(handler) => (KeyOutcome::Done(handler(host, keys[i])), i + 1),
                        None => (KeyOutcome::Unknown, i),
                    };
                }
                None => {
                    return match bound {
                        Some(binding) if binding.followed == FollowedBy::Selector => {
                            let (outcome, used) =
                                self.run_operator(host, binding, key_info, &keys[i..], info, flow);
                            (outcome, i + used)
                        }
                        Some(binding) => {
                            trace!(target: "keys.dispatch", consumed = i, "fall_through");
                            (self.run_cmd(host, binding, key_info, info, flow), i)
                        }
                        None => (KeyOutcome::Unknown, i),
                    };
                }
            }
        }

        // `pending` already degrades to Unknown once the chord timed out.
        match trie.binding(node) {
            Some(binding) if !Self::role_allows(binding, info) && !trie.has_children(node) => {
                (KeyOutcome::Unknown, keys.len())
            }
            None => pending,
            Some(binding) if binding.followed != FollowedBy::None => pending,
            Some(_) if trie.has_children(node) && !flow.timed_out => pending,
            Some(binding) => (self.run_cmd(host, binding, key_info, info, flow), keys.len()),
        }
    }

    /// Resolves the selector following an operator, then runs the operator
    /// over the indexes the selector produced.
    fn run_operator(
        &self,
        host: &mut H,
        operator: &KeyBinding<H>,
        key_info: KeyInfo,
        rest: &[char],
        info: &mut KeysInfo,
        flow: Flow,
    ) -> (KeyOutcome, usize) {
        if !Self::role_allows(operator, info) {
            return (KeyOutcome::Unknown, rest.len());
        }
        let mut sel_info = KeysInfo {
            selector: true,
            indexes: Vec::new(),
            after_wait: info.after_wait,
            mapped: info.mapped,
            recursive: info.recursive,
        };
        let (outcome, used) = self.execute_step(host, rest, &mut sel_info, flow);
        if !outcome.is_ok() {
            trace!(target: "keys.dispatch", ?outcome, "selector_unresolved");
            return (outcome, used);
        }
        let mut op_info = KeysInfo {
            selector: true,
            indexes: sel_info.indexes,
            after_wait: info.after_wait,
            mapped: info.mapped,
            recursive: info.recursive,
        };
        debug!(target: "keys.dispatch", targets = op_info.indexes.len(), "operator_apply");
        (self.invoke(host, operator, key_info, &mut op_info, flow), used)
    }

    fn run_cmd(
        &self,
        host: &mut H,
        binding: &KeyBinding<H>,
        key_info: KeyInfo,
        info: &mut KeysInfo,
        flow: Flow,
    ) -> KeyOutcome {
        if !Self::role_allows(binding, info) {
            trace!(target: "keys.dispatch", selector = info.selector, role = ?binding.role, "role_rejected");
            return KeyOutcome::Unknown;
        }
        self.invoke(host, binding, key_info, info, flow)
    }

    fn invoke(
        &self,
        host: &mut H,
        binding: &KeyBinding<H>,
        key_info: KeyInfo,
        info: &mut KeysInfo,
        flow: Flow,
    ) -> KeyOutcome {
        match &binding.cmd {
            KeyCmd::Native(handler) => KeyOutcome::Done(handler(host, key_info, info)),
            KeyCmd::User(rhs) => {
                if flow.depth >= MAX_KEY_RECURSION {
                    warn!(target: "keys.dispatch", rhs = rhs.as_str(), depth = flow.depth, "mapping_recursion_limit");
                    return KeyOutcome::RecursionLimit;
                }
                let mut seq = Vec::with_capacity(rhs.len() + 8);
                if let Some(reg) = key_info.register {
                    seq.extend(['"', reg]);
                }
                if let Some(count) = key_info.count {
                    seq.extend(count.to_string().chars());
                }
                seq.extend(rhs.chars());
                let mut nested = KeysInfo {
                    selector: info.selector,
                    indexes: std::mem::take(&mut info.indexes),
                    after_wait: info.after_wait,
                    mapped: true,
                    recursive: true,
                };
                let nested_flow = Flow {
                    timed_out: false,
                    depth: flow.depth + 1,
                };
                let (outcome, _) = self.execute_chars(host, &seq, &mut nested, nested_flow);
                info.indexes = nested.indexes;
                outcome
            }
        }
    }

    fn role_allows(binding: &KeyBinding<H>, info: &KeysInfo) -> bool {
        match binding.role {
            SelectorRole::NotASelector => !info.selector,
            SelectorRole::Selector => true,
            SelectorRole::SelectorOnly => info.selector,
        }
    }

    fn wait(flags: ModeFlags, flow: Flow) -> KeyOutcome {
        if flow.timed_out {
            KeyOutcome::Unknown
        } else if flags.contains(ModeFlags::USES_INPUT) {
            KeyOutcome::WaitShort
        } else {
            KeyOutcome::Wait
        }
    }
}

/// Leading count: digits, the first of which is not `0`.
fn parse_count(keys: &[char]) -> (Option<u32>, usize) {
    if !matches!(keys.first(), Some('1'..='9')) {
        return (None, 0);
    }
    let mut count: u32 = 0;
    let mut used = 0;
    for ch in keys.iter().take_while(|c| c.is_ascii_digit()) {
        let digit = ch.to_digit(10).unwrap_or(0);
        count = count.saturating_mul(10).saturating_add(digit).min(MAX_COUNT);
        used += 1;
    }
    (Some(count), used)
}
