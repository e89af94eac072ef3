use std::sync::Arc;

use anyhow::Result;
use pretty_assertions::assert_eq;

use ashfall_script::opcode;
use ashfall_script::test::{build_program, CodeBuf, NullHost, ProcFixture};
use ashfall_script::{
    CallOutcome, ExportTable, ObjectId, OpcodeRegistry, Program, Value, Vm, VmConfig, VmSnapshot,
    VmState,
};

fn registry() -> Arc<OpcodeRegistry> {
    Arc::new(OpcodeRegistry::core())
}

fn counter_program() -> Result<Arc<Program>> {
    // tick: global 0 += 1 (treating unset as 0 via an explicit seed proc)
    let mut seed = CodeBuf::new();
    seed.op(opcode::PUSH_INT).put_i32(0);
    seed.op(opcode::SET_GLOBAL).put_u16(0);
    seed.op(opcode::PUSH_FLOAT).put_f64(2.5);
    seed.op(opcode::SET_GLOBAL).put_u16(1);
    seed.op(opcode::RET);

    let mut tick = CodeBuf::new();
    tick.op(opcode::GET_GLOBAL).put_u16(0);
    tick.op(opcode::PUSH_INT).put_i32(1);
    tick.op(opcode::ADD);
    tick.op(opcode::SET_GLOBAL).put_u16(0);
    tick.op(opcode::RET);

    let mut read = CodeBuf::new();
    read.op(opcode::GET_GLOBAL).put_u16(0);
    read.op(opcode::RETV);

    build_program(
        "ticker.prog",
        vec![
            ProcFixture::new("seed", 0, 0, seed),
            ProcFixture::new("tick", 0, 0, tick),
            ProcFixture::new("read", 0, 0, read),
        ],
        &[],
        3,
    )
}

#[test]
fn snapshot_restores_identical_behavior_on_a_fresh_instance() -> Result<()> {
    let program = counter_program()?;
    let mut host = NullHost;
    let mut exports = ExportTable::new();

    let mut original = Vm::load(
        Arc::clone(&program),
        registry(),
        VmConfig::default(),
        ObjectId(1),
    );
    original.call(&mut host, &mut exports, "seed");
    original.call(&mut host, &mut exports, "tick");
    original.call(&mut host, &mut exports, "tick");

    let snapshot = original.snapshot();
    assert_eq!(snapshot.program, "ticker.prog");
    // unset slots are omitted
    assert_eq!(
        snapshot.globals,
        vec![(0, Value::Int(2)), (1, Value::Float(2.5))]
    );

    let mut restored = Vm::load(program, registry(), VmConfig::default(), ObjectId(2));
    restored.restore(&snapshot)?;
    assert_eq!(restored.state(), VmState::Ready);

    // Both instances continue identically from here.
    let a = original.call(&mut host, &mut exports, "tick");
    let b = restored.call(&mut host, &mut exports, "tick");
    assert_eq!(a, b);
    assert_eq!(
        original.call(&mut host, &mut exports, "read"),
        restored.call(&mut host, &mut exports, "read")
    );
    assert_eq!(
        restored.call(&mut host, &mut exports, "read"),
        CallOutcome::Returned(Some(Value::Int(3)))
    );
    Ok(())
}

#[test]
fn snapshot_survives_the_wire_encoding() -> Result<()> {
    let program = counter_program()?;
    let mut host = NullHost;
    let mut exports = ExportTable::new();

    let mut vm = Vm::load(
        Arc::clone(&program),
        registry(),
        VmConfig::default(),
        ObjectId(1),
    );
    vm.call(&mut host, &mut exports, "seed");
    vm.call(&mut host, &mut exports, "tick");

    let bytes = bincode::serialize(&vm.snapshot())?;
    let decoded: VmSnapshot = bincode::deserialize(&bytes)?;
    assert_eq!(decoded, vm.snapshot());
    Ok(())
}

#[test]
fn restore_rejects_a_foreign_snapshot() -> Result<()> {
    let program = counter_program()?;
    let mut vm = Vm::load(program, registry(), VmConfig::default(), ObjectId(1));

    let foreign = VmSnapshot {
        program: "other.prog".into(),
        globals: vec![],
    };
    assert!(vm.restore(&foreign).is_err());

    let oob = VmSnapshot {
        program: "ticker.prog".into(),
        globals: vec![(40, Value::Int(1))],
    };
    assert!(vm.restore(&oob).is_err());
    Ok(())
}

#[test]
fn export_table_snapshot_is_deterministic_and_restorable() -> Result<()> {
    let mut exports = ExportTable::new();
    exports.declare("zulu", Value::Int(1));
    exports.declare("alpha", Value::Str(0));
    exports.declare("mike", Value::Object(Some(ObjectId(4))));

    let snap = exports.snapshot();
    let names: Vec<&str> = snap.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["alpha", "mike", "zulu"]);

    let bytes = bincode::serialize(&exports)?;
    let decoded: ExportTable = bincode::deserialize(&bytes)?;
    assert_eq!(decoded.snapshot(), snap);

    let mut fresh = ExportTable::new();
    fresh.restore(&snap);
    assert_eq!(fresh.get("mike").unwrap(), Value::Object(Some(ObjectId(4))));
    Ok(())
}
