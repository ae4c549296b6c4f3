//! Ex commands of the reference host.

use core_cmdline::{CmdDescriptor, CmdError, CmdId, CmdInfo, CmdResult, Commands};
use regex::RegexBuilder;
use tracing::debug;

use crate::host::{Host, Mode, Pending, UNNAMED};

pub const GOTO: CmdId = CmdId(1);
pub const DELETE: CmdId = CmdId(2);
pub const YANK: CmdId = CmdId(3);
pub const PUT: CmdId = CmdId(4);
pub const MARK: CmdId = CmdId(5);
pub const MARKS: CmdId = CmdId(6);
pub const ECHO: CmdId = CmdId(7);
pub const SUBSTITUTE: CmdId = CmdId(8);
pub const SELECT: CmdId = CmdId(9);
pub const MAP: CmdId = CmdId(10);
pub const UNMAP: CmdId = CmdId(11);
pub const QUIT: CmdId = CmdId(12);
pub const SHELL: CmdId = CmdId(13);

pub fn descriptors() -> Vec<CmdDescriptor<Host>> {
    vec![
        CmdDescriptor::native("", GOTO, goto).range(),
        CmdDescriptor::native("!", SHELL, shell)
            .args(0, None)
            .expand_macros()
            .background(),
        CmdDescriptor::native("delete", DELETE, delete)
            .abbr("d")
            .range()
            .args(0, Some(1))
            .select_range(),
        CmdDescriptor::native("echo", ECHO, echo)
            .args(0, None)
            .expand_macros(),
        CmdDescriptor::native("map", MAP, map).bang().args(0, None),
        CmdDescriptor::native("mark", MARK, mark)
            .abbr("ma")
            .range()
            .args(1, Some(1)),
        CmdDescriptor::native("marks", MARKS, marks).args(0, Some(1)),
        CmdDescriptor::native("put", PUT, put)
            .abbr("pu")
            .range()
            .bang()
            .args(0, Some(1)),
        CmdDescriptor::native("quit", QUIT, quit).abbr("q").bang(),
        CmdDescriptor::native("select", SELECT, select)
            .range()
            .bang(),
        CmdDescriptor::native("substitute", SUBSTITUTE, substitute)
            .abbr("s")
            .range()
            .custom_separator()
            .regexp_args()
            .args(1, Some(3)),
        CmdDescriptor::native("unmap", UNMAP, unmap).bang().args(1, Some(1)),
        CmdDescriptor::native("yank", YANK, yank)
            .abbr("y")
            .range()
            .args(0, Some(1))
            .select_range(),
        CmdDescriptor::user_factory().expand_macros(),
    ]
}

pub fn install(cmds: &mut Commands<Host>) -> Result<(), CmdError> {
    cmds.add_builtin_commands(descriptors())
}

/// Addressed range, defaulting to the cursor line.
fn span(host: &Host, info: &CmdInfo) -> (usize, usize) {
    info.range
        .map_or((host.cursor, host.cursor), |r| (r.begin, r.end))
}

fn register(info: &CmdInfo) -> Result<char, CmdError> {
    match info.arg(0) {
        None => Ok(UNNAMED),
        Some(arg) => {
            let mut chars = arg.chars();
            match (chars.next(), chars.next()) {
                (Some(reg), None) => Ok(reg),
                _ => Err(CmdError::Failed(format!("Invalid register name: {arg}"))),
            }
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

fn goto(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    if let Some(range) = info.range {
        host.set_cursor(range.end);
    }
    Ok(0)
}

fn delete(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let reg = register(info)?;
    let (begin, end) = span(host, info);
    let count = host.delete(begin, end, reg);
    host.report(format!("{count} item{} deleted", plural(count)));
    Ok(0)
}

fn yank(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let reg = register(info)?;
    let (begin, end) = span(host, info);
    let count = host.yank(begin, end, reg);
    host.report(format!("{count} item{} yanked", plural(count)));
    Ok(0)
}

fn put(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let reg = register(info)?;
    let (_, at) = span(host, info);
    match host.put(reg, at, info.bang) {
        Some(count) => {
            host.report(format!("{count} item{} put", plural(count)));
            Ok(0)
        }
        None => Err(CmdError::Failed(format!("Register {reg} is empty"))),
    }
}

fn mark(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let name = info.arg(0).unwrap_or("");
    let (_, at) = span(host, info);
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(m), None) if host.set_mark(m, at) => Ok(0),
        _ => Err(CmdError::Failed(format!("Invalid mark name: {name}"))),
    }
}

fn marks(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let filter = info.arg(0).unwrap_or("");
    let lines: Vec<String> = host
        .marks
        .iter()
        .filter(|(m, _)| filter.is_empty() || filter.contains(**m))
        .map(|(m, idx)| {
            let item = host.items.get(*idx).map_or("", String::as_str);
            format!("{m} {:>4} {item}", idx + 1)
        })
        .collect();
    if lines.is_empty() {
        host.report("No marks set");
    }
    host.output.extend(lines);
    Ok(0)
}

fn echo(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    host.report(info.argv.join(" "));
    Ok(0)
}

/// `:s/pattern/replacement/[g]` over the addressed items.
fn substitute(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let pattern = info.arg(0).unwrap_or("");
    let replacement = info.arg(1).unwrap_or("");
    let flags = info.arg(2).unwrap_or("");
    let global = flags.contains('g');
    let re = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .build()
        .map_err(|e| CmdError::Failed(e.to_string()))?;

    let (begin, end) = span(host, info);
    let end = end.min(host.last());
    let mut changed = 0;
    for item in host.items.iter_mut().take(end + 1).skip(begin) {
        let next = if global {
            re.replace_all(item.as_str(), replacement)
        } else {
            re.replace(item.as_str(), replacement)
        };
        if next != item.as_str() {
            *item = next.into_owned();
            changed += 1;
        }
    }
    debug!(target: "host.cmds", pattern, changed, "substitute");
    host.report(format!("{changed} substitution{}", plural(changed)));
    Ok(0)
}

fn select(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    host.selection = if info.bang {
        None
    } else {
        Some(span(host, info))
    };
    Ok(0)
}

fn map_mode(info: &CmdInfo) -> Mode {
    if info.bang { Mode::Cmdline } else { Mode::Normal }
}

/// `map lhs rhs` queues a mapping; `map` alone lists them.
fn map(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let mode = map_mode(info);
    let args = info.args.trim();
    if args.is_empty() {
        host.pending.push_back(Pending::ListMaps(mode));
        return Ok(0);
    }
    match args.split_once(char::is_whitespace) {
        Some((lhs, rhs)) if !rhs.trim().is_empty() => {
            host.pending.push_back(Pending::Map {
                mode,
                lhs: lhs.to_string(),
                rhs: rhs.trim_start().to_string(),
            });
            Ok(0)
        }
        _ => Err(CmdError::TooFewArguments),
    }
}

fn unmap(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let lhs = info.arg(0).unwrap_or("").to_string();
    host.pending.push_back(Pending::Unmap {
        mode: map_mode(info),
        lhs,
    });
    Ok(0)
}

fn quit(_: &mut Commands<Host>, host: &mut Host, _: &CmdInfo) -> CmdResult {
    host.quit = true;
    Ok(0)
}

/// Records the shell line; nothing is spawned.
fn shell(_: &mut Commands<Host>, host: &mut Host, info: &CmdInfo) -> CmdResult {
    let line = info.args.trim().to_string();
    if line.is_empty() {
        return Err(CmdError::TooFewArguments);
    }
    let suffix = if info.background { " &" } else { "" };
    host.report(format!("!{line}{suffix}"));
    host.shell_history.push(line);
    Ok(0)
}
