//! Commands: the registry plus the parse/validate/execute pipeline.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::args::split_args;
use crate::parser::{parse_tail, split_name, strip_background, strip_prompt};
use crate::range::parse_range;
use crate::registry::{CmdBody, CmdDescriptor, CmdKind, Registered, Registry};
use crate::{CmdError, CmdHost, CmdId, CmdInfo, CmdRange, CmdResult, MAX_CMD_RECURSION};

pub struct Commands<H> {
    pub(crate) registry: Registry<H>,
}

/// A validated invocation and what it will run.
struct Prepared<H> {
    info: CmdInfo,
    desc: CmdDescriptor<H>,
    depth: Rc<Cell<usize>>,
}

/// Outcome of range parsing and name lookup.
struct Resolved<'l, 'r, H> {
    range: Option<CmdRange>,
    tail: &'l str,
    reg: &'r Registered<H>,
}

/// Holds one level of a descriptor's recursion counter.
struct DepthGuard(Rc<Cell<usize>>);

impl DepthGuard {
    fn enter(depth: &Rc<Cell<usize>>) -> Self {
        depth.set(depth.get() + 1);
        Self(Rc::clone(depth))
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl<H: CmdHost> Commands<H> {
    /// Creates an empty registry. With `user_defined` the `command` and
    /// `delcommand` built-ins are installed.
    pub fn new(user_defined: bool) -> Self {
        let mut cmds = Self {
            registry: Registry::new(),
        };
        if user_defined {
            let builtins = [
                CmdDescriptor::native("command", CmdId::COMMAND, cmd_command::<H>)
                    .abbr("com")
                    .bang()
                    .args(0, None),
                CmdDescriptor::native("delcommand", CmdId::DELCOMMAND, cmd_delcommand::<H>)
                    .abbr("delc")
                    .args(1, Some(1)),
            ];
            for desc in builtins {
                if let Err(err) = cmds.registry.insert_builtin(desc) {
                    debug!(target: "cmds.registry", %err, "builtin_rejected");
                }
            }
        }
        cmds
    }

    /// Registers descriptors in order, stopping at the first invalid one.
    pub fn add_builtin_commands(
        &mut self,
        descs: impl IntoIterator<Item = CmdDescriptor<H>>,
    ) -> Result<(), CmdError> {
        descs
            .into_iter()
            .try_for_each(|desc| self.registry.insert_builtin(desc))
    }

    /// Drops user commands and zeroes every recursion counter.
    pub fn reset_cmds(&mut self) {
        self.registry.clear_user();
        debug!(target: "cmds.registry", "reset");
    }

    /// `(name, body)` of every user command, sorted by name.
    pub fn user_commands(&self) -> Vec<(String, String)> {
        self.registry.user_commands()
    }

    /// Current recursion depth of the command registered as `name`.
    pub fn depth(&self, name: &str) -> Option<usize> {
        self.registry.get(name).map(|reg| reg.depth.get())
    }

    /// Parses and runs one command line. An empty line does nothing.
    pub fn execute_cmd(&mut self, host: &mut H, line: &str) -> CmdResult {
        let Some(Prepared { info, desc, depth }) = self.prepare(host, line)? else {
            return Ok(0);
        };
        if depth.get() >= MAX_CMD_RECURSION {
            debug!(target: "cmds.exec", name = %info.name, "recursion_limit");
            return Err(CmdError::RecursionLimit);
        }
        if desc.select_range {
            host.select_range(desc.id, &info);
        }

        let result = {
            let _guard = DepthGuard::enter(&depth);
            trace!(target: "cmds.exec", name = %info.name, depth = depth.get(), "enter");
            match &desc.body {
                CmdBody::Native(handler) => handler(self, host, &info),
                CmdBody::Macro(body) => {
                    let text = host.substitute_user_args(body, &info);
                    self.execute_cmd(host, &text)
                }
            }
        };
        host.post(desc.id);

        match &result {
            Ok(code) => debug!(target: "cmds.exec", name = %info.name, code, "done"),
            Err(err) => debug!(target: "cmds.exec", name = %info.name, %err, "failed"),
        }
        result
    }

    /// Parses and validates a line without running it.
    pub fn parse_cmd(&self, host: &mut H, line: &str) -> Result<Option<CmdInfo>, CmdError> {
        Ok(self.prepare(host, line)?.map(|prepared| prepared.info))
    }

    /// Id of the command a line invokes. User commands share
    /// [`CmdId::USER`].
    pub fn get_cmd_id(&self, host: &mut H, line: &str) -> Option<CmdId> {
        let resolved = self.resolve(host, line).ok()??;
        Some(resolved.reg.desc.id)
    }

    /// Argument separator a line would be tokenized with.
    pub fn get_cmd_sep(&self, host: &mut H, line: &str) -> char {
        let Ok(Some(Resolved { tail, reg, .. })) = self.resolve(host, line) else {
            return ' ';
        };
        let mut info = CmdInfo::new(reg.desc.name.as_str());
        parse_tail(tail, reg.desc.custom_separator, &mut info);
        info.separator
    }

    /// Range, name lookup and the unparsed tail.
    fn resolve<'l>(
        &self,
        host: &mut H,
        line: &'l str,
    ) -> Result<Option<Resolved<'l, '_, H>>, CmdError> {
        let line = strip_prompt(line);
        let (range, rest) = parse_range(line, host)?;
        if range.is_none() && rest.trim().is_empty() {
            return Ok(None);
        }
        let (typed, tail) = split_name(rest, |name| self.registry.contains(name));
        if typed.is_empty() && range.is_none() {
            return Err(CmdError::InvalidCommand(rest.trim().to_string()));
        }
        let reg = self
            .registry
            .find(typed)
            .ok_or_else(|| CmdError::InvalidCommand(typed.to_string()))?;
        trace!(target: "cmds.parse", typed, name = %reg.desc.name, "resolved");
        Ok(Some(Resolved { range, tail, reg }))
    }

    fn prepare(&self, host: &mut H, line: &str) -> Result<Option<Prepared<H>>, CmdError> {
        let Some(Resolved { range, tail, reg }) = self.resolve(host, line)? else {
            return Ok(None);
        };
        let desc = reg.desc.clone();
        let depth = Rc::clone(&reg.depth);

        let mut info = CmdInfo::new(desc.name.as_str());
        info.range = range;
        let raw = parse_tail(tail, desc.custom_separator, &mut info);
        info.raw_args = raw.to_string();

        let mut args = if desc.expand_macros {
            host.expand_macros(raw, desc.id)
        } else {
            raw.to_string()
        };
        if desc.background
            && let Some(head) = strip_background(&args)
        {
            args = head.to_string();
            info.background = true;
        }
        info.argv = split_args(&args, info.separator, desc.regexp_args)?;
        info.args = args;
        if reg.kind == CmdKind::UserDefined
            && let CmdBody::Macro(body) = &desc.body
        {
            info.user_body = Some(body.clone());
        }

        validate(&desc, &info)?;
        trace!(target: "cmds.parse", name = %info.name, argc = info.argv.len(), "parsed");
        Ok(Some(Prepared { info, desc, depth }))
    }
}

fn validate<H>(desc: &CmdDescriptor<H>, info: &CmdInfo) -> Result<(), CmdError> {
    let argc = info.argv.len();
    if info.range.is_some() && !desc.range {
        return Err(CmdError::NoRangeAllowed);
    }
    if argc < desc.min_args {
        return Err(CmdError::TooFewArguments);
    }
    if desc.max_args.is_some_and(|max| argc > max) {
        return Err(CmdError::TooManyArguments);
    }
    if info.bang && !desc.bang {
        return Err(CmdError::NoBangAllowed);
    }
    if info.query && !desc.query {
        return Err(CmdError::NoQueryAllowed);
    }
    if info.query && !info.raw_args.trim().is_empty() {
        return Err(CmdError::TrailingCharacters);
    }
    Ok(())
}

fn is_user_name(name: &str) -> bool {
    name == "!" || name == "?" || (!name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic()))
}

fn cmd_command<H: CmdHost>(cmds: &mut Commands<H>, host: &mut H, info: &CmdInfo) -> CmdResult {
    if info.argv.len() < 2 {
        let prefix = info.arg(0).unwrap_or("");
        let listed: Vec<_> = cmds
            .user_commands()
            .into_iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .collect();
        host.list_user_commands(&listed);
        return Ok(0);
    }

    let args = info.args.trim_start();
    let (name, body) = match args.split_once(char::is_whitespace) {
        Some((name, body)) => (name, body.trim_start()),
        None => (args, ""),
    };
    if !is_user_name(name) {
        return Err(CmdError::IncorrectName(name.to_string()));
    }
    match cmds.registry.kind_of(name) {
        Some(CmdKind::BuiltinCommand | CmdKind::BuiltinAbbreviation) => {
            Err(CmdError::NoBuiltinRedefinition)
        }
        Some(CmdKind::UserDefined) if !info.bang => Err(CmdError::BangRequired),
        _ => {
            cmds.registry.define_user(name, body);
            Ok(0)
        }
    }
}

fn cmd_delcommand<H: CmdHost>(cmds: &mut Commands<H>, _host: &mut H, info: &CmdInfo) -> CmdResult {
    let name = info.arg(0).unwrap_or("");
    if cmds.registry.remove_user(name) {
        Ok(0)
    } else {
        Err(CmdError::UnknownUserCommand(name.to_string()))
    }
}
