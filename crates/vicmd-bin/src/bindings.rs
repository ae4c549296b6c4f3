//! Key bindings of the reference host.
//!
//! Normal mode takes registers and counts. `j`, `k`, `gg`, `G` and `'x`
//! double as selectors for the `d` and `y` operators; `dd`, `yy`, `p`
//! and `m` only work on their own. Command-line mode collects every
//! unbound key into the line.

use core_keymap::{
    FollowedBy, KeyInfo, Keys, KeysError, KeysInfo, ModeConf, ModeFlags, SelectorRole,
};

use crate::host::{Host, Mode, Pending, UNNAMED};

pub const ENTER: char = '\r';
pub const ESC: char = '\x1b';
pub const BACKSPACE: char = '\x7f';
pub const TAB: char = '\t';

/// Builds the dispatcher with every mode and binding installed.
pub fn keys() -> Result<Keys<Host>, KeysError> {
    let mut keys = Keys::new(vec![
        ModeConf::new(ModeFlags::USES_REGS | ModeFlags::USES_COUNT),
        ModeConf::new(ModeFlags::USES_REGS | ModeFlags::USES_COUNT),
        ModeConf::new(ModeFlags::USES_INPUT).with_default(cmdline_insert),
    ]);
    install_normal(&mut keys)?;
    install_visual(&mut keys)?;
    install_cmdline(&mut keys)?;
    Ok(keys)
}

fn install_normal(keys: &mut Keys<Host>) -> Result<(), KeysError> {
    let n = Mode::Normal.index();
    keys.add_keys("j", n, down)?
        .selector(SelectorRole::Selector)
        .remappable();
    keys.add_keys("k", n, up)?
        .selector(SelectorRole::Selector)
        .remappable();
    keys.add_keys("gg", n, top)?.selector(SelectorRole::Selector);
    keys.add_keys("G", n, bottom)?.selector(SelectorRole::Selector);
    keys.add_keys("'", n, jump_to_mark)?
        .followed_by(FollowedBy::Multikey)
        .selector(SelectorRole::Selector);
    keys.add_keys("d", n, delete_op)?
        .followed_by(FollowedBy::Selector);
    keys.add_keys("dd", n, delete_lines)?;
    keys.add_keys("y", n, yank_op)?
        .followed_by(FollowedBy::Selector);
    keys.add_keys("yy", n, yank_lines)?;
    keys.add_keys("m", n, set_mark)?
        .followed_by(FollowedBy::Multikey);
    keys.add_keys("p", n, put_after)?;
    keys.add_keys("P", n, put_before)?;
    keys.add_keys("v", n, visual)?;
    keys.add_keys(":", n, cmdline)?;
    keys.add_keys("ZZ", n, quit)?;
    Ok(())
}

fn install_visual(keys: &mut Keys<Host>) -> Result<(), KeysError> {
    let v = Mode::Visual.index();
    keys.add_keys("j", v, down)?.remappable();
    keys.add_keys("k", v, up)?.remappable();
    keys.add_keys("gg", v, top)?;
    keys.add_keys("G", v, bottom)?;
    keys.add_keys("d", v, delete_selection)?;
    keys.add_keys("y", v, yank_selection)?;
    keys.add_keys("v", v, leave)?;
    keys.add_keys(&ESC.to_string(), v, leave)?;
    keys.add_keys(":", v, cmdline)?;
    Ok(())
}

fn install_cmdline(keys: &mut Keys<Host>) -> Result<(), KeysError> {
    let c = Mode::Cmdline.index();
    keys.add_keys(&ENTER.to_string(), c, cmdline_submit)?;
    keys.add_keys("\n", c, cmdline_submit)?;
    keys.add_keys(&ESC.to_string(), c, leave)?;
    keys.add_keys(&BACKSPACE.to_string(), c, cmdline_backspace)?;
    keys.add_keys(&TAB.to_string(), c, cmdline_complete)?;
    Ok(())
}

fn register(info: &KeyInfo) -> char {
    info.register.unwrap_or(UNNAMED)
}

/// Moves to `target`, or reports the span up to it when resolving a
/// selector.
fn motion(h: &mut Host, target: usize, keys: &mut KeysInfo) -> i32 {
    if h.items.is_empty() {
        return -1;
    }
    let target = target.min(h.last());
    if keys.selector {
        keys.indexes
            .extend(h.cursor.min(target)..=h.cursor.max(target));
    } else {
        h.cursor = target;
    }
    0
}

fn down(h: &mut Host, info: KeyInfo, keys: &mut KeysInfo) -> i32 {
    let target = h.cursor.saturating_add(info.count_or(1) as usize);
    motion(h, target, keys)
}

fn up(h: &mut Host, info: KeyInfo, keys: &mut KeysInfo) -> i32 {
    let target = h.cursor.saturating_sub(info.count_or(1) as usize);
    motion(h, target, keys)
}

fn top(h: &mut Host, info: KeyInfo, keys: &mut KeysInfo) -> i32 {
    let target = info.count.map_or(0, |n| n as usize - 1);
    motion(h, target, keys)
}

fn bottom(h: &mut Host, info: KeyInfo, keys: &mut KeysInfo) -> i32 {
    let target = info.count.map_or(h.last(), |n| n as usize - 1);
    motion(h, target, keys)
}

fn jump_to_mark(h: &mut Host, info: KeyInfo, keys: &mut KeysInfo) -> i32 {
    match info.multi.and_then(|m| h.mark(m)) {
        Some(target) => motion(h, target, keys),
        None => {
            h.report("Mark is not set");
            -1
        }
    }
}

/// Span covered by an operator's selector.
fn targets(keys: &KeysInfo) -> Option<(usize, usize)> {
    let begin = keys.indexes.iter().min()?;
    let end = keys.indexes.iter().max()?;
    Some((*begin, *end))
}

fn delete_op(h: &mut Host, info: KeyInfo, keys: &mut KeysInfo) -> i32 {
    let Some((begin, end)) = targets(keys) else {
        return -1;
    };
    let count = h.delete(begin, end, register(&info));
    h.report(format!("{count} deleted"));
    0
}

fn yank_op(h: &mut Host, info: KeyInfo, keys: &mut KeysInfo) -> i32 {
    let Some((begin, end)) = targets(keys) else {
        return -1;
    };
    let count = h.yank(begin, end, register(&info));
    h.report(format!("{count} yanked"));
    0
}

fn delete_lines(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    let end = h.cursor + info.count_or(1) as usize - 1;
    let count = h.delete(h.cursor, end, register(&info));
    h.report(format!("{count} deleted"));
    0
}

fn yank_lines(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    let end = h.cursor + info.count_or(1) as usize - 1;
    let count = h.yank(h.cursor, end, register(&info));
    h.report(format!("{count} yanked"));
    0
}

fn set_mark(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    match info.multi {
        Some(m) if h.set_mark(m, h.cursor) => 0,
        _ => {
            h.report("Invalid mark name");
            -1
        }
    }
}

fn put(h: &mut Host, info: KeyInfo, before: bool) -> i32 {
    let reg = register(&info);
    for _ in 0..info.count_or(1) {
        if h.put(reg, h.cursor, before).is_none() {
            h.report(format!("Register {reg} is empty"));
            return -1;
        }
    }
    0
}

fn put_after(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    put(h, info, false)
}

fn put_before(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    put(h, info, true)
}

fn visual(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.enter_mode(Mode::Visual);
    0
}

fn leave(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.enter_mode(Mode::Normal);
    0
}

fn delete_selection(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    let Some((begin, end)) = h.visual_range() else {
        return -1;
    };
    h.enter_mode(Mode::Normal);
    let count = h.delete(begin, end, register(&info));
    h.report(format!("{count} deleted"));
    0
}

fn yank_selection(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    let Some((begin, end)) = h.visual_range() else {
        return -1;
    };
    h.enter_mode(Mode::Normal);
    let count = h.yank(begin, end, register(&info));
    h.report(format!("{count} yanked"));
    0
}

fn quit(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.quit = true;
    0
}

fn cmdline(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    let from_visual = h.mode == Mode::Visual;
    h.enter_mode(Mode::Cmdline);
    if from_visual {
        h.cmdline.push_str("'<,'>");
    }
    0
}

fn cmdline_insert(h: &mut Host, ch: char) -> i32 {
    h.cmdline.push(ch);
    0
}

fn cmdline_backspace(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    if h.cmdline.pop().is_none() {
        h.enter_mode(Mode::Normal);
    }
    0
}

fn cmdline_submit(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    let line = std::mem::take(&mut h.cmdline);
    h.enter_mode(Mode::Normal);
    h.pending.push_back(Pending::Command(line));
    0
}

fn cmdline_complete(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.pending.push_back(Pending::Complete);
    0
}
