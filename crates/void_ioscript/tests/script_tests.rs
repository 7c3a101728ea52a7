//! Integration tests for void_ioscript script execution

use void_ioscript::*;

fn engine() -> ScriptEngine {
    ScriptEngine::new(ScriptConfig::default().with_seed(42)).unwrap()
}

fn spawn(engine: &mut ScriptEngine, class: &str, script: &str) -> EntityId {
    engine.spawn(Entity::new(class, EntityFlags::NPC).with_script(ScriptSource::from_raw(class, script)))
}

#[test]
fn test_init_example() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        r#"on init { set #x 1 if ( #x == 1 ) { set $ok "yes" accept } else { set $ok "no" refuse } }"#,
    );

    let result = engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(result, ScriptResult::Accept);
    assert_eq!(engine.global("$ok"), Some(VarValue::Text("yes".into())));
}

#[test]
fn test_accept_and_refuse_results() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n accept\n}\n\non hit {\n refuse\n}\n\non die {\n set #x 1\n}\n",
    );

    assert_eq!(engine.send(id, ScriptMessage::Init).unwrap(), ScriptResult::Accept);
    assert_eq!(engine.send(id, ScriptMessage::Hit).unwrap(), ScriptResult::Refuse);
    assert_eq!(engine.send(id, ScriptMessage::Die).unwrap(), ScriptResult::Accept);
    assert_eq!(engine.send(id, "chat").unwrap(), ScriptResult::Accept);
}

#[test]
fn test_short_circuit_skips_failing_operand() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n if (and(1 == 2, $s < 3)) { set #r 1 } else { set #r 2 }\n accept\n}\n",
    );
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("#r"), Some(VarValue::Int(2)));
}

#[test]
fn test_short_circuit_does_not_resolve_operands() {
    let host = RecordingHost::new();
    host.set_var("^life", VarValue::Float(50.0));
    let mut engine = ScriptEngine::with_host(ScriptConfig::default(), Box::new(host.clone())).unwrap();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n if (and(1 == 2, ^life > 3)) set #a 1\n if (or(1 == 1, ^life > 3)) set #b 1\n if (not(and(1 == 2, ^life > 3))) set #c 1\n accept\n}\n",
    );
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("#a"), Some(VarValue::Int(0)));
    assert_eq!(engine.global("#b"), Some(VarValue::Int(1)));
    assert_eq!(engine.global("#c"), Some(VarValue::Int(1)));
    assert_eq!(host.queried("^life"), 0);

    let id = spawn(&mut engine, "npc", "on init {\n if (and(1 == 1, ^life > 3)) set #d 1\n accept\n}\n");
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("#d"), Some(VarValue::Int(1)));
    assert_eq!(host.queried("^life"), 1);
}

#[test]
fn test_condition_failure_runs_else() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n if ($s < 3) { set #r 1 } else { set #r 2 }\n set #after 1\n accept\n}\n",
    );
    assert_eq!(engine.send(id, ScriptMessage::Init).unwrap(), ScriptResult::Accept);
    assert_eq!(engine.global("#r"), Some(VarValue::Int(2)));
    assert_eq!(engine.global("#after"), Some(VarValue::Int(1)));
}

#[test]
fn test_first_label_wins() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n goto dup\n}\n>>dup\n set #which 1\n accept\n>>dup\n set #which 2\n accept\n",
    );
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("#which"), Some(VarValue::Int(1)));
}

#[test]
fn test_gosub_returns_after_call() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n set $log a\n gosub middle set $log ~$log~c\n set $log ~$log~d\n accept\n}\n\n>>middle\n set $log ~$log~b\n return\n",
    );
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("$log"), Some(VarValue::Text("abcd".into())));
}

#[test]
fn test_nested_gosub() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n gosub one\n inc #n 100\n accept\n}\n>>one\n inc #n 1\n gosub two\n inc #n 1\n return\n>>two\n inc #n 10\n return\n",
    );
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("#n"), Some(VarValue::Int(112)));
}

#[test]
fn test_globals_shared_locals_isolated() {
    let mut engine = engine();
    let script = "on init {\n inc #count 1\n inc §mine 1\n accept\n}\n";
    let a = spawn(&mut engine, "npc", script);
    let b = spawn(&mut engine, "npc", script);

    engine.send(a, ScriptMessage::Init).unwrap();
    engine.send(b, ScriptMessage::Init).unwrap();
    engine.send(b, ScriptMessage::Init).unwrap();

    assert_eq!(engine.global("#count"), Some(VarValue::Int(3)));
    assert_eq!(engine.local(a, "§mine"), Some(VarValue::Int(1)));
    assert_eq!(engine.local(b, "§mine"), Some(VarValue::Int(2)));
}

#[test]
fn test_interpolation() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n set $name Bob\n set &pi 3.14159\n set $msg \"hello ~$name~, pi is ~%.2f,&pi~ from ~^me~\"\n accept\n}\n",
    );
    engine.send(id, ScriptMessage::Init).unwrap();
    // Script text is lowercased on load
    assert_eq!(
        engine.global("$msg"),
        Some(VarValue::Text("hello bob, pi is 3.14 from npc_0001".into()))
    );
}

#[test]
fn test_comments_are_ignored() {
    let mut engine = engine();
    let id = spawn(
        &mut engine,
        "npc",
        "// header comment\non init {\n /* set #a 1\n set #b 1 */\n set #c 1 // set #d 1\n accept\n}\n",
    );
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("#a"), Some(VarValue::Int(0)));
    assert_eq!(engine.global("#b"), Some(VarValue::Int(0)));
    assert_eq!(engine.global("#c"), Some(VarValue::Int(1)));
    assert_eq!(engine.global("#d"), Some(VarValue::Int(0)));
}

#[test]
fn test_event_parameters_and_sender() {
    let mut engine = engine();
    let caller = spawn(&mut engine, "caller", "on init {\n sendevent greet target_0001 \"3 four\"\n accept\n}\n");
    spawn(
        &mut engine,
        "target",
        "on greet {\n set #n ^#param1\n set $w ^$param2\n set $who ^sender\n accept\n}\n",
    );
    engine.send(caller, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("#n"), Some(VarValue::Int(3)));
    assert_eq!(engine.global("$w"), Some(VarValue::Text("four".into())));
    assert_eq!(engine.global("$who"), Some(VarValue::Text("caller_0001".into())));
}

#[test]
fn test_override_script() {
    let mut engine = engine();
    let id = engine.spawn(
        Entity::new("door", EntityFlags::FIX)
            .with_script(ScriptSource::from_raw("door", "on action {\n set $opened class\n accept\n}\n"))
            .with_override(ScriptSource::from_raw(
                "door_0001",
                "on action {\n if (#locked == 1) refuse\n accept\n}\n",
            )),
    );

    engine.set_global("#locked", VarValue::Int(1)).unwrap();
    assert_eq!(engine.send(id, ScriptMessage::Action).unwrap(), ScriptResult::Refuse);
    assert_eq!(engine.global("$opened"), Some(VarValue::Text(String::new())));

    engine.set_global("#locked", VarValue::Int(0)).unwrap();
    assert_eq!(engine.send(id, ScriptMessage::Action).unwrap(), ScriptResult::Accept);
    assert_eq!(engine.global("$opened"), Some(VarValue::Text("class".into())));
}

#[test]
fn test_host_system_variables() {
    let host = RecordingHost::new();
    host.set_var("^life", VarValue::Float(12.5));
    let mut engine = ScriptEngine::with_host(ScriptConfig::default(), Box::new(host.clone())).unwrap();
    let id = spawn(
        &mut engine,
        "npc",
        "on init {\n set &hp ^life\n set #unknown ^#notavar\n if (^life > 10) speak healthy\n accept\n}\n",
    );
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("&hp"), Some(VarValue::Float(12.5)));
    assert_eq!(engine.global("#unknown"), Some(VarValue::Int(0)));
    assert_eq!(host.commands_named("speak").len(), 1);
}

#[test]
fn test_custom_commands() {
    let mut engine = engine();
    engine
        .registry_mut()
        .register_fn("double", |ctx| {
            let word = ctx.get_word();
            let Some(key) = VarKey::parse(&word) else {
                return CommandResult::Failed;
            };
            let value = ctx.read_key(&key).as_int() * 2;
            ctx.set_var(&key, VarValue::Int(value));
            CommandResult::Success
        })
        .unwrap();
    assert!(engine.registry_mut().register_fn("set", |_| CommandResult::Success).is_err());

    let id = spawn(&mut engine, "npc", "on init {\n set #x 21\n double #x\n accept\n}\n");
    engine.send(id, ScriptMessage::Init).unwrap();
    assert_eq!(engine.global("#x"), Some(VarValue::Int(42)));
}

#[test]
fn test_suppression_resumes_block() {
    let text = "on init {\n set #a 1\n}\n set #b 1\n accept\n";
    let position = text.find('}').unwrap() + 1;

    let mut plain = engine();
    let id = spawn(&mut plain, "chest", text);
    assert_eq!(plain.send(id, ScriptMessage::Init).unwrap(), ScriptResult::Accept);
    assert_eq!(plain.global("#b"), Some(VarValue::Int(0)));

    let path = std::env::temp_dir().join(format!("ioscript_suppress_{}.toml", std::process::id()));
    std::fs::write(
        &path,
        format!(
            "[[suppress]]\nscript = \"chest\"\nposition = {}\ntoken = \"}}\"\nresume = true\n",
            position
        ),
    )
    .unwrap();

    let mut engine = ScriptEngine::new(ScriptConfig::default().with_suppressions(&path)).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(engine.world().suppressions().len(), 1);

    let id = spawn(&mut engine, "chest", text);
    assert_eq!(engine.send(id, ScriptMessage::Init).unwrap(), ScriptResult::Accept);
    assert_eq!(engine.global("#a"), Some(VarValue::Int(1)));
    assert_eq!(engine.global("#b"), Some(VarValue::Int(1)));
}

#[test]
fn test_suppressed_unknown_command_keeps_running() {
    let text = "on init {\n badcommand 1\n set #after 1\n accept\n}\n";
    let position = text.find("badcommand").unwrap() + "badcommand".len();
    let table = format!(
        "[[suppress]]\nscript = \"npc\"\nposition = {}\ntoken = \"badcommand\"\n",
        position
    );
    let suppressions = SuppressionTable::from_toml_str(&table).unwrap();
    assert!(suppressions.is_suppressed("npc", position, "badcommand"));
    assert!(!suppressions.resumes_block("npc", position));

    let mut engine = engine();
    let id = spawn(&mut engine, "npc", text);
    assert_eq!(engine.send(id, ScriptMessage::Init).unwrap(), ScriptResult::Accept);
    assert_eq!(engine.global("#after"), Some(VarValue::Int(1)));
}
