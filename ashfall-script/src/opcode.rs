//! Opcode numbering and operand widths.
//!
//! The encoding is fixed by the script compiler: a big-endian u16 opcode
//! word, followed by that opcode's inline operands (widths below). The
//! numbering groups codes in blocks so a disassembly reads cleanly:
//! `0x80xx` for the machine's own instructions, `0x81xx` for instructions
//! that forward into the engine.
//!
//! Inline operand widths per opcode (everything else comes off the stack):
//!
//! | opcode           | inline operands                 |
//! |------------------|---------------------------------|
//! | `JMP`, `JZ`      | u32 target                      |
//! | `CALL`           | u16 procedure index             |
//! | `PUSH_INT`       | i32 (sign-extended to i64)      |
//! | `PUSH_FLOAT`     | f64 bits                        |
//! | `PUSH_STR`       | u32 string id                   |
//! | `GET/SET_GLOBAL` | u16 slot                        |
//! | `GET/SET_LOCAL`  | u16 slot                        |
//! | export ops       | u32 string id (the export name) |
//! | `GET/SET_PROP`   | u16 property id                 |
//! | `ACTION`         | u16 action id, u8 arg count     |

// control
pub const NOP: u16 = 0x8000;
pub const JMP: u16 = 0x8001;
pub const JZ: u16 = 0x8002;
pub const CALL: u16 = 0x8003;
pub const RET: u16 = 0x8004;
pub const RETV: u16 = 0x8005;
pub const POP: u16 = 0x8006;
pub const DUP: u16 = 0x8007;
pub const SWAP: u16 = 0x8008;

// constants
pub const PUSH_INT: u16 = 0x8010;
pub const PUSH_FLOAT: u16 = 0x8011;
pub const PUSH_STR: u16 = 0x8012;
pub const PUSH_UNSET: u16 = 0x8013;
pub const PUSH_SELF: u16 = 0x8014;

// variables
pub const GET_GLOBAL: u16 = 0x8020;
pub const SET_GLOBAL: u16 = 0x8021;
pub const GET_LOCAL: u16 = 0x8022;
pub const SET_LOCAL: u16 = 0x8023;
pub const EXPORT_VAR: u16 = 0x8024;
pub const GET_EXPORT: u16 = 0x8025;
pub const SET_EXPORT: u16 = 0x8026;

// arithmetic / logic
pub const ADD: u16 = 0x8030;
pub const SUB: u16 = 0x8031;
pub const MUL: u16 = 0x8032;
pub const DIV: u16 = 0x8033;
pub const MOD: u16 = 0x8034;
pub const NEG: u16 = 0x8035;
pub const NOT: u16 = 0x8036;
pub const AND: u16 = 0x8037;
pub const OR: u16 = 0x8038;
pub const BAND: u16 = 0x8039;
pub const BOR: u16 = 0x803A;

// comparisons
pub const EQ: u16 = 0x8040;
pub const NE: u16 = 0x8041;
pub const LT: u16 = 0x8042;
pub const LE: u16 = 0x8043;
pub const GT: u16 = 0x8044;
pub const GE: u16 = 0x8045;

// engine-forwarding
pub const GET_PROP: u16 = 0x8100;
pub const SET_PROP: u16 = 0x8101;
pub const SPAWN: u16 = 0x8102;
pub const DESTROY: u16 = 0x8103;
pub const OBJ_EXISTS: u16 = 0x8104;
pub const ACTION: u16 = 0x8105;
