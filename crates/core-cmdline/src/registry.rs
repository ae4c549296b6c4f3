//! Command descriptors and the name-sorted registry.
//!
//! Every descriptor lives in one slot; the name index maps both the full
//! name and the abbreviation of a built-in to the same slot. Lookup by a
//! typed name picks the first key (in sort order) the typed text prefixes.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::dispatch::Commands;
use crate::{CmdError, CmdId, CmdInfo, CmdResult, USER_CMD_FACTORY};

/// Native command handler.
pub type CmdHandler<H> = fn(&mut Commands<H>, &mut H, &CmdInfo) -> CmdResult;

pub enum CmdBody<H> {
    Native(CmdHandler<H>),
    /// Command line text executed on invocation.
    Macro(String),
}

impl<H> Clone for CmdBody<H> {
    fn clone(&self) -> Self {
        match self {
            CmdBody::Native(handler) => CmdBody::Native(*handler),
            CmdBody::Macro(text) => CmdBody::Macro(text.clone()),
        }
    }
}

impl<H> fmt::Debug for CmdBody<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmdBody::Native(_) => f.write_str("Native"),
            CmdBody::Macro(text) => f.debug_tuple("Macro").field(text).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdKind {
    BuiltinCommand,
    BuiltinAbbreviation,
    UserDefined,
}

/// What a command is and which invocations it accepts.
pub struct CmdDescriptor<H> {
    pub name: String,
    pub abbr: Option<String>,
    pub id: CmdId,
    pub body: CmdBody<H>,
    pub range: bool,
    pub custom_separator: bool,
    pub bang: bool,
    pub query: bool,
    pub min_args: usize,
    /// `None` is unbounded.
    pub max_args: Option<usize>,
    pub expand_macros: bool,
    pub regexp_args: bool,
    pub select_range: bool,
    pub background: bool,
}

impl<H> CmdDescriptor<H> {
    /// A built-in that takes no range, no flags and no arguments until the
    /// builder methods say otherwise.
    pub fn native(name: impl Into<String>, id: CmdId, handler: CmdHandler<H>) -> Self {
        Self {
            name: name.into(),
            abbr: None,
            id,
            body: CmdBody::Native(handler),
            range: false,
            custom_separator: false,
            bang: false,
            query: false,
            min_args: 0,
            max_args: Some(0),
            expand_macros: false,
            regexp_args: false,
            select_range: false,
            background: false,
        }
    }

    /// Constraints applied to every user-defined command. Registering it
    /// through `add_builtin_commands` replaces the defaults.
    pub fn user_factory() -> Self {
        Self {
            name: USER_CMD_FACTORY.to_string(),
            abbr: None,
            id: CmdId::USER,
            body: CmdBody::Macro(String::new()),
            range: true,
            custom_separator: false,
            bang: false,
            query: false,
            min_args: 0,
            max_args: None,
            expand_macros: false,
            regexp_args: false,
            select_range: false,
            background: false,
        }
    }

    pub fn abbr(mut self, abbr: impl Into<String>) -> Self {
        self.abbr = Some(abbr.into());
        self
    }

    pub fn range(mut self) -> Self {
        self.range = true;
        self
    }

    pub fn custom_separator(mut self) -> Self {
        self.custom_separator = true;
        self
    }

    pub fn bang(mut self) -> Self {
        self.bang = true;
        self
    }

    pub fn query(mut self) -> Self {
        self.query = true;
        self
    }

    pub fn args(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_args = min;
        self.max_args = max;
        self
    }

    pub fn expand_macros(mut self) -> Self {
        self.expand_macros = true;
        self
    }

    pub fn regexp_args(mut self) -> Self {
        self.regexp_args = true;
        self
    }

    pub fn select_range(mut self) -> Self {
        self.select_range = true;
        self
    }

    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    fn user(factory: &CmdDescriptor<H>, name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            abbr: None,
            id: CmdId::USER,
            body: CmdBody::Macro(body.to_string()),
            ..factory.clone()
        }
    }
}

impl<H> Clone for CmdDescriptor<H> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            abbr: self.abbr.clone(),
            id: self.id,
            body: self.body.clone(),
            range: self.range,
            custom_separator: self.custom_separator,
            bang: self.bang,
            query: self.query,
            min_args: self.min_args,
            max_args: self.max_args,
            expand_macros: self.expand_macros,
            regexp_args: self.regexp_args,
            select_range: self.select_range,
            background: self.background,
        }
    }
}

impl<H> fmt::Debug for CmdDescriptor<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmdDescriptor")
            .field("name", &self.name)
            .field("abbr", &self.abbr)
            .field("id", &self.id)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// A registered descriptor with its recursion counter.
pub(crate) struct Registered<H> {
    pub(crate) desc: CmdDescriptor<H>,
    pub(crate) kind: CmdKind,
    pub(crate) depth: Rc<Cell<usize>>,
}

impl<H> Registered<H> {
    fn new(desc: CmdDescriptor<H>, kind: CmdKind) -> Self {
        Self {
            desc,
            kind,
            depth: Rc::new(Cell::new(0)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    slot: usize,
    kind: CmdKind,
}

pub(crate) struct Registry<H> {
    slots: Vec<Option<Registered<H>>>,
    free: Vec<usize>,
    names: BTreeMap<String, Entry>,
    factory: CmdDescriptor<H>,
}

impl<H> Registry<H> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            names: BTreeMap::new(),
            factory: CmdDescriptor::user_factory(),
        }
    }

    fn alloc(&mut self, reg: Registered<H>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(reg);
                slot
            }
            None => {
                self.slots.push(Some(reg));
                self.slots.len() - 1
            }
        }
    }

    fn slot(&self, entry: Entry) -> Option<&Registered<H>> {
        self.slots.get(entry.slot).and_then(Option::as_ref)
    }

    /// Resolves a typed name. The empty name only matches itself.
    pub(crate) fn find(&self, typed: &str) -> Option<&Registered<H>> {
        let entry = if typed.is_empty() {
            self.names.get("").copied()
        } else {
            self.names
                .range::<str, _>((Bound::Included(typed), Bound::Unbounded))
                .next()
                .filter(|(name, _)| name.starts_with(typed))
                .map(|(_, entry)| *entry)
        }?;
        self.slot(entry)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    fn exact(&self, name: &str) -> Option<Entry> {
        self.names.get(name).copied()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Registered<H>> {
        self.exact(name).and_then(|entry| self.slot(entry))
    }

    pub(crate) fn insert_builtin(&mut self, desc: CmdDescriptor<H>) -> Result<(), CmdError> {
        if desc.max_args.is_some_and(|max| desc.min_args > max) {
            debug!(target: "cmds.registry", name = %desc.name, "min_args_above_max");
            return Err(CmdError::InvalidDescriptor(desc.name));
        }
        if desc.name == USER_CMD_FACTORY {
            debug!(target: "cmds.registry", "user_factory_installed");
            self.factory = desc;
            return Ok(());
        }
        if let Some(abbr) = &desc.abbr
            && (abbr.is_empty() || !desc.name.starts_with(abbr.as_str()))
        {
            debug!(target: "cmds.registry", name = %desc.name, abbr = %abbr, "abbreviation_not_prefix");
            return Err(CmdError::InvalidDescriptor(desc.name));
        }
        if self.names.contains_key(&desc.name)
            || desc.abbr.as_ref().is_some_and(|a| self.names.contains_key(a))
        {
            debug!(target: "cmds.registry", name = %desc.name, "duplicate");
            return Err(CmdError::DuplicateCommand(desc.name));
        }
        let name = desc.name.clone();
        let abbr = desc.abbr.clone();
        let slot = self.alloc(Registered::new(desc, CmdKind::BuiltinCommand));
        self.names.insert(
            name.clone(),
            Entry {
                slot,
                kind: CmdKind::BuiltinCommand,
            },
        );
        if let Some(abbr) = abbr {
            self.names.insert(
                abbr,
                Entry {
                    slot,
                    kind: CmdKind::BuiltinAbbreviation,
                },
            );
        }
        debug!(target: "cmds.registry", name = %name, "builtin_added");
        Ok(())
    }

    pub(crate) fn kind_of(&self, name: &str) -> Option<CmdKind> {
        self.exact(name).map(|entry| entry.kind)
    }

    /// Adds or replaces a user command. Callers check for collisions.
    pub(crate) fn define_user(&mut self, name: &str, body: &str) {
        if let Some(entry) = self.exact(name)
            && let Some(Some(reg)) = self.slots.get_mut(entry.slot)
        {
            reg.desc.body = CmdBody::Macro(body.to_string());
            debug!(target: "cmds.registry", name, "user_command_replaced");
            return;
        }
        let desc = CmdDescriptor::user(&self.factory, name, body);
        let slot = self.alloc(Registered::new(desc, CmdKind::UserDefined));
        self.names.insert(
            name.to_string(),
            Entry {
                slot,
                kind: CmdKind::UserDefined,
            },
        );
        debug!(target: "cmds.registry", name, "user_command_defined");
    }

    pub(crate) fn remove_user(&mut self, name: &str) -> bool {
        match self.exact(name) {
            Some(entry) if entry.kind == CmdKind::UserDefined => {
                self.names.remove(name);
                self.slots[entry.slot] = None;
                self.free.push(entry.slot);
                debug!(target: "cmds.registry", name, "user_command_removed");
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear_user(&mut self) {
        let user: Vec<String> = self
            .names
            .iter()
            .filter(|(_, entry)| entry.kind == CmdKind::UserDefined)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &user {
            self.remove_user(name);
        }
        for reg in self.slots.iter().flatten() {
            reg.depth.set(0);
        }
    }

    /// `(name, body)` of every user command, sorted by name.
    pub(crate) fn user_commands(&self) -> Vec<(String, String)> {
        self.names
            .iter()
            .filter(|(_, entry)| entry.kind == CmdKind::UserDefined)
            .filter_map(|(name, entry)| match &self.slot(*entry)?.desc.body {
                CmdBody::Macro(body) => Some((name.clone(), body.clone())),
                CmdBody::Native(_) => None,
            })
            .collect()
    }

    /// Full names (no abbreviations) that start with `prefix`.
    pub(crate) fn names_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.names
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(name, _)| name.starts_with(prefix))
            .filter(|(_, entry)| entry.kind != CmdKind::BuiltinAbbreviation)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    fn noop(_: &mut Commands<Nothing>, _: &mut Nothing, _: &CmdInfo) -> CmdResult {
        Ok(0)
    }

    fn registry() -> Registry<Nothing> {
        let mut reg = Registry::new();
        for (name, abbr, id) in [("delete", "d", 1), ("delmarks", "delm", 2), ("yank", "y", 3)] {
            reg.insert_builtin(CmdDescriptor::native(name, CmdId(id), noop).abbr(abbr))
                .unwrap();
        }
        reg
    }

    #[test]
    fn prefix_lookup_prefers_sort_order() {
        let reg = registry();
        assert_eq!(reg.find("d").map(|r| r.desc.id), Some(CmdId(1)));
        assert_eq!(reg.find("del").map(|r| r.desc.id), Some(CmdId(1)));
        assert_eq!(reg.find("delm").map(|r| r.desc.id), Some(CmdId(2)));
        assert!(reg.find("x").is_none());
        assert!(reg.find("").is_none());
    }

    #[test]
    fn abbreviation_shares_descriptor() {
        let reg = registry();
        assert_eq!(reg.kind_of("y"), Some(CmdKind::BuiltinAbbreviation));
        assert_eq!(reg.get("y").map(|r| r.desc.name.as_str()), Some("yank"));
    }

    #[test]
    fn rejects_bad_descriptors() {
        let mut reg = registry();
        let dup = CmdDescriptor::native("yank", CmdId(9), noop);
        assert_eq!(
            reg.insert_builtin(dup),
            Err(CmdError::DuplicateCommand("yank".into()))
        );
        let abbr_taken = CmdDescriptor::native("dance", CmdId(9), noop).abbr("d");
        assert_eq!(
            reg.insert_builtin(abbr_taken),
            Err(CmdError::DuplicateCommand("dance".into()))
        );
        let not_prefix = CmdDescriptor::native("put", CmdId(9), noop).abbr("x");
        assert_eq!(
            reg.insert_builtin(not_prefix),
            Err(CmdError::InvalidDescriptor("put".into()))
        );
        let inverted = CmdDescriptor::native("put", CmdId(9), noop).args(2, Some(1));
        assert_eq!(
            reg.insert_builtin(inverted),
            Err(CmdError::InvalidDescriptor("put".into()))
        );
    }

    #[test]
    fn user_commands_copy_factory_constraints() {
        let mut reg = registry();
        reg.insert_builtin(CmdDescriptor::user_factory().bang().args(0, Some(3)))
            .unwrap();
        reg.define_user("go", "delete");
        let go = reg.get("go").unwrap();
        assert!(go.desc.bang);
        assert_eq!(go.desc.max_args, Some(3));
        assert_eq!(go.desc.id, CmdId::USER);
        assert_eq!(go.kind, CmdKind::UserDefined);
    }

    #[test]
    fn user_commands_are_listed_and_removed() {
        let mut reg = registry();
        reg.define_user("top", "1");
        reg.define_user("bottom", "$");
        reg.define_user("top", "2");
        assert_eq!(
            reg.user_commands(),
            vec![("bottom".into(), "$".into()), ("top".into(), "2".into())]
        );
        assert!(reg.remove_user("top"));
        assert!(!reg.remove_user("top"));
        assert!(!reg.remove_user("yank"));
        reg.clear_user();
        assert!(reg.user_commands().is_empty());
    }

    #[test]
    fn prefix_listing_skips_abbreviations() {
        let reg = registry();
        let names: Vec<_> = reg.names_with_prefix("d").collect();
        assert_eq!(names, vec!["delete", "delmarks"]);
    }

    #[test]
    fn lookup_at_the_ends_of_the_index() {
        let reg = registry();
        assert_eq!(reg.find("yank").map(|r| r.desc.id), Some(CmdId(3)));
        assert!(reg.find("z").is_none());
        assert!(reg.find("yanks").is_none());
        let all: Vec<_> = reg.names_with_prefix("").collect();
        assert_eq!(all, vec!["delete", "delmarks", "yank"]);
        assert_eq!(reg.names_with_prefix("zz").count(), 0);
    }
}
