use core_keymap::{
    FollowedBy, KeyInfo, KeyOutcome, Keys, KeysError, KeysHost, KeysInfo, MAX_KEY_RECURSION,
    ModeConf, ModeFlags, SelectorRole,
};
use pretty_assertions::assert_eq;

const NORMAL: usize = 0;
const INSERT: usize = 1;

#[derive(Default)]
struct Host {
    mode: usize,
    cursor: usize,
    log: Vec<String>,
}

impl KeysHost for Host {
    fn mode(&self) -> usize {
        self.mode
    }
}

fn linewise_delete(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.log
        .push(format!("dd:{}:{:?}", info.count_or(1), info.register));
    0
}

fn delete_op(h: &mut Host, _: KeyInfo, keys: &mut KeysInfo) -> i32 {
    h.log.push(format!("d{:?}", keys.indexes));
    0
}

fn down(h: &mut Host, info: KeyInfo, keys: &mut KeysInfo) -> i32 {
    let n = info.count_or(1) as usize;
    if keys.selector {
        keys.indexes.extend(h.cursor..=h.cursor + n);
    } else {
        h.cursor += n;
    }
    let suffix = if keys.mapped { ":mapped" } else { "" };
    h.log.push(format!("j:{n}{suffix}"));
    0
}

fn word(h: &mut Host, _: KeyInfo, keys: &mut KeysInfo) -> i32 {
    keys.indexes.push(h.cursor);
    h.log.push("w".to_string());
    0
}

fn goto_top(h: &mut Host, _: KeyInfo, keys: &mut KeysInfo) -> i32 {
    if keys.selector {
        keys.indexes.extend(0..=h.cursor);
    } else {
        h.cursor = 0;
    }
    h.log.push("gg".to_string());
    0
}

fn g_prefix(h: &mut Host, _: KeyInfo, keys: &mut KeysInfo) -> i32 {
    let suffix = if keys.after_wait { ":after_wait" } else { "" };
    h.log.push(format!("g{suffix}"));
    0
}

fn jump_mark(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.log.push(format!("mark:{:?}", info.multi));
    0
}

fn quote_pair(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.log.push("quote_pair".to_string());
    0
}

fn enter_insert(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.mode = INSERT;
    h.log.push("i".to_string());
    0
}

fn leave_insert(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.mode = NORMAL;
    h.log.push("esc".to_string());
    0
}

fn failing(h: &mut Host, _: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.log.push("fail".to_string());
    -3
}

fn put(h: &mut Host, info: KeyInfo, _: &mut KeysInfo) -> i32 {
    h.log.push(format!("p:{:?}", info.register));
    0
}

fn insert_literal(h: &mut Host, ch: char) -> i32 {
    h.log.push(format!("+{ch}"));
    0
}

fn modes() -> Vec<ModeConf<Host>> {
    vec![
        ModeConf::new(ModeFlags::USES_REGS | ModeFlags::USES_COUNT),
        ModeConf::new(ModeFlags::USES_INPUT).with_default(insert_literal),
    ]
}

fn normal_keys() -> Keys<Host> {
    let mut keys = Keys::new(modes());
    keys.add_keys("dd", NORMAL, linewise_delete).unwrap();
    keys.add_keys("d", NORMAL, delete_op)
        .unwrap()
        .followed_by(FollowedBy::Selector);
    keys.add_keys("j", NORMAL, down)
        .unwrap()
        .selector(SelectorRole::Selector);
    keys.add_keys("gg", NORMAL, goto_top)
        .unwrap()
        .selector(SelectorRole::Selector);
    keys.add_keys("g", NORMAL, g_prefix).unwrap();
    keys.add_keys("w", NORMAL, word)
        .unwrap()
        .selector(SelectorRole::SelectorOnly);
    keys.add_keys("'", NORMAL, jump_mark)
        .unwrap()
        .followed_by(FollowedBy::Multikey);
    keys.add_keys("''", NORMAL, quote_pair).unwrap();
    keys.add_keys("i", NORMAL, enter_insert).unwrap();
    keys.add_keys("q", NORMAL, failing).unwrap();
    keys.add_keys("p", NORMAL, put).unwrap().remappable();
    keys.add_keys("\u{1b}", INSERT, leave_insert).unwrap();
    keys
}

#[test]
fn dd_waits_on_prefix_then_runs_once() {
    let mut keys = Keys::new(modes());
    keys.add_keys("dd", NORMAL, linewise_delete).unwrap();
    let mut host = Host::default();

    assert_eq!(keys.execute_keys(&mut host, "d"), KeyOutcome::Wait);
    assert!(host.log.is_empty());

    assert_eq!(keys.execute_keys(&mut host, "dd"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["dd:1:None"]);
}

#[test]
fn incomplete_chord_in_input_mode_is_short_wait() {
    let mut keys = Keys::new(modes());
    keys.add_keys("jk", INSERT, leave_insert).unwrap();
    let mut host = Host {
        mode: INSERT,
        ..Host::default()
    };
    assert_eq!(keys.execute_keys(&mut host, "j"), KeyOutcome::WaitShort);
}

#[test]
fn register_and_count_prefix() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "\"a3dd"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["dd:3:Some('a')"]);
}

#[test]
fn lone_register_prefix_waits() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "\""), KeyOutcome::Wait);
    assert_eq!(keys.execute_keys(&mut host, "\"b"), KeyOutcome::Wait);
    assert_eq!(keys.execute_keys(&mut host, "12"), KeyOutcome::Wait);
}

#[test]
fn multikey_parameter_wins_over_child_edge() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "''"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["mark:Some('\\'')"]);

    host.log.clear();
    assert_eq!(keys.execute_keys(&mut host, "'x"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["mark:Some('x')"]);

    assert_eq!(keys.execute_keys(&mut host, "'"), KeyOutcome::Wait);
}

#[test]
fn bound_prefix_falls_through_to_next_chord() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "gj"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["g", "j:1"]);
    assert_eq!(host.cursor, 1);
}

#[test]
fn ambiguous_terminal_waits_until_timeout() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "g"), KeyOutcome::Wait);
    assert!(host.log.is_empty());
    assert_eq!(keys.execute_keys_timed_out(&mut host, "g"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["g:after_wait"]);
}

#[test]
fn operator_applies_to_selector_indexes() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "d3j"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["j:3", "d[0, 1, 2, 3]"]);
    // selectors do not move the cursor
    assert_eq!(host.cursor, 0);
}

#[test]
fn operator_with_multikey_selector_path() {
    let keys = normal_keys();
    let mut host = Host {
        cursor: 2,
        ..Host::default()
    };
    assert_eq!(keys.execute_keys(&mut host, "dgg"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["gg", "d[0, 1, 2]"]);
}

#[test]
fn operator_waits_for_selector() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "d"), KeyOutcome::Wait);
    assert_eq!(keys.execute_keys(&mut host, "2d"), KeyOutcome::Wait);
    assert_eq!(keys.execute_keys(&mut host, "dg"), KeyOutcome::Wait);
    assert!(host.log.is_empty());
}

#[test]
fn non_selector_rejected_after_operator() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "di"), KeyOutcome::Unknown);
    assert!(host.log.is_empty());
    assert_eq!(host.mode, NORMAL);
}

#[test]
fn selector_only_needs_operator() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "w"), KeyOutcome::Unknown);
    assert!(host.log.is_empty());
    assert_eq!(keys.execute_keys(&mut host, "dw"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["w", "d[0]"]);
}

#[test]
fn handler_switching_mode_affects_rest_of_sequence() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "iab\u{1b}j"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["i", "+a", "+b", "esc", "j:1"]);
}

#[test]
fn unknown_without_default_handler() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "z"), KeyOutcome::Unknown);
    assert_eq!(keys.execute_keys(&mut host, ""), KeyOutcome::Unknown);
}

#[test]
fn negative_handler_result_stops_dispatch() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "qj"), KeyOutcome::Done(-3));
    assert_eq!(host.log, vec!["fail"]);
}

#[test]
fn user_mapping_reenters_with_count() {
    let mut keys = normal_keys();
    keys.add_user_keys("J", "3j", NORMAL).unwrap();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "J"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["j:3:mapped"]);
    assert_eq!(host.cursor, 3);

    host.log.clear();
    assert_eq!(keys.execute_keys(&mut host, "2J"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["j:23:mapped"]);
}

#[test]
fn user_mapping_works_as_selector() {
    let mut keys = normal_keys();
    keys.add_user_keys("J", "2j", NORMAL).unwrap();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "dJ"), KeyOutcome::Done(0));
    assert_eq!(host.log, vec!["j:2:mapped", "d[0, 1, 2]"]);
}

#[test]
fn remapping_native_binding_is_rejected() {
    let mut keys = normal_keys();
    assert_eq!(
        keys.add_user_keys("dd", "j", NORMAL),
        Err(KeysError::NativeBinding("dd".to_string()))
    );
    assert!(!keys.has_user_keys("dd", NORMAL));
}

#[test]
fn remappable_native_is_restored_by_unmap() {
    let mut keys = normal_keys();
    keys.add_user_keys("p", "j", NORMAL).unwrap();
    let mut host = Host::default();
    keys.execute_keys(&mut host, "\"xp");
    assert_eq!(host.log, vec!["j:1:mapped"]);

    keys.remove_user_keys("p", NORMAL).unwrap();
    host.log.clear();
    keys.execute_keys(&mut host, "\"xp");
    assert_eq!(host.log, vec!["p:Some('x')"]);
    assert_eq!(
        keys.remove_user_keys("p", NORMAL),
        Err(KeysError::NotMapped("p".to_string()))
    );
}

#[test]
fn self_referential_mapping_hits_ceiling() {
    let mut keys = normal_keys();
    keys.add_user_keys("a", "a", NORMAL).unwrap();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "a"), KeyOutcome::RecursionLimit);
    assert_eq!(MAX_KEY_RECURSION, 16);
}

#[test]
fn recursive_mapping_expands_exactly_to_the_ceiling() {
    let mut keys = normal_keys();
    keys.add_user_keys("a", "ja", NORMAL).unwrap();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "a"), KeyOutcome::RecursionLimit);
    assert_eq!(host.cursor, MAX_KEY_RECURSION);
    assert_eq!(host.log.len(), MAX_KEY_RECURSION);
    assert!(host.log.iter().all(|entry| entry == "j:1:mapped"));
}

#[test]
fn pending_suffix_excludes_chords_that_ran() {
    let keys = normal_keys();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys_partial(&mut host, "g"), (KeyOutcome::Wait, 1));
    assert!(host.log.is_empty());

    assert_eq!(keys.execute_keys_partial(&mut host, "gd"), (KeyOutcome::Wait, 1));
    assert_eq!(host.log, vec!["g"]);

    assert_eq!(keys.execute_keys_partial(&mut host, "\"a2d"), (KeyOutcome::Wait, 4));
    assert_eq!(keys.execute_keys_partial(&mut host, "dd"), (KeyOutcome::Done(0), 0));
    assert_eq!(keys.execute_keys_partial(&mut host, "x"), (KeyOutcome::Unknown, 0));
}

#[test]
fn listing_and_clearing_user_keys() {
    let mut keys = normal_keys();
    keys.add_user_keys("zz", "gg", NORMAL).unwrap();
    keys.add_user_keys("J", "3j", NORMAL).unwrap();
    keys.add_user_keys("jk", "\u{1b}", INSERT).unwrap();
    assert_eq!(
        keys.list_user_keys(NORMAL),
        vec![
            ("J".to_string(), "3j".to_string()),
            ("zz".to_string(), "gg".to_string()),
        ]
    );
    keys.clear_user_keys();
    assert!(keys.list_user_keys(NORMAL).is_empty());
    assert!(keys.list_user_keys(INSERT).is_empty());
    // built-ins survive
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "j"), KeyOutcome::Done(0));
}

#[test]
fn registration_errors() {
    let mut keys = normal_keys();
    assert_eq!(
        keys.add_keys("", NORMAL, down).err(),
        Some(KeysError::EmptySequence)
    );
    assert_eq!(
        keys.add_user_keys("x", "j", 7),
        Err(KeysError::InvalidMode(7))
    );
    keys.reset();
    let mut host = Host::default();
    assert_eq!(keys.execute_keys(&mut host, "j"), KeyOutcome::Unknown);
}
