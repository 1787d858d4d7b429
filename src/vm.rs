use serde_json::Value;
use std::collections::BTreeSet;

pub(crate) type Slot = usize;

/// Where a slot's value comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SlotDef {
    /// The value passed to [`Program::evaluate`].
    Root,
    /// Member `key` of the object in the parent slot.
    Member(Slot, String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Const(bool),
    IsNull(Slot),
    IsAbsent(Slot),
    IsString(Slot),
    IsNumber(Slot),
    IsObject(Slot),
    /// Operand is an index into `Program::keys`.
    Has(Slot, usize),
    /// Operand is an index into `Program::key_sets`.
    OnlyKeys(Slot, usize),
    Not,
    Jump(usize),
    JumpIfFalse(usize),
    JumpIfTrue(usize),
}

/// A check expression lowered to bytecode.
///
/// The program runs on a single boolean accumulator. Each value it inspects
/// lives in a slot, which is a member of another slot or the root value.
/// Slots are looked up at most once per evaluation.
#[derive(Clone, Debug)]
pub struct Program {
    pub(crate) ops: Vec<Op>,
    pub(crate) slots: Vec<SlotDef>,
    pub(crate) keys: Vec<String>,
    pub(crate) key_sets: Vec<BTreeSet<String>>,
    pub(crate) source: String,
}

/// Slot values resolved during one evaluation.
pub(crate) struct Frame<'v> {
    values: Vec<Option<Option<&'v Value>>>,
    #[cfg(test)]
    pub(crate) loads: usize,
}

impl<'v> Frame<'v> {
    pub(crate) fn new(slots: usize) -> Self {
        Self {
            values: vec![None; slots],
            #[cfg(test)]
            loads: 0,
        }
    }
}

impl Program {
    /// Runs the program against `instance`. `None` stands for an absent value.
    pub fn evaluate(&self, instance: Option<&Value>) -> bool {
        self.run(instance, &mut Frame::new(self.slots.len()))
    }

    pub(crate) fn run<'v>(&self, instance: Option<&'v Value>, frame: &mut Frame<'v>) -> bool {
        let mut acc = false;
        let mut pc = 0;

        while let Some(op) = self.ops.get(pc) {
            pc += 1;

            match *op {
                Op::Const(b) => acc = b,
                Op::IsNull(slot) => {
                    acc = matches!(self.load(instance, frame, slot), Some(Value::Null))
                }
                Op::IsAbsent(slot) => acc = self.load(instance, frame, slot).is_none(),
                Op::IsString(slot) => {
                    acc = matches!(self.load(instance, frame, slot), Some(Value::String(_)))
                }
                Op::IsNumber(slot) => {
                    acc = matches!(self.load(instance, frame, slot), Some(Value::Number(_)))
                }
                Op::IsObject(slot) => {
                    acc = matches!(self.load(instance, frame, slot), Some(Value::Object(_)))
                }
                Op::Has(slot, key) => {
                    acc = self
                        .load(instance, frame, slot)
                        .and_then(Value::as_object)
                        .map_or(false, |obj| obj.contains_key(&self.keys[key]))
                }
                Op::OnlyKeys(slot, set) => {
                    let allowed = &self.key_sets[set];
                    acc = self
                        .load(instance, frame, slot)
                        .and_then(Value::as_object)
                        .map_or(false, |obj| obj.keys().all(|name| allowed.contains(name)))
                }
                Op::Not => acc = !acc,
                Op::Jump(target) => pc = target,
                Op::JumpIfFalse(target) => {
                    if !acc {
                        pc = target;
                    }
                }
                Op::JumpIfTrue(target) => {
                    if acc {
                        pc = target;
                    }
                }
            }
        }

        acc
    }

    /// The expression this program was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn load<'v>(
        &self,
        instance: Option<&'v Value>,
        frame: &mut Frame<'v>,
        slot: Slot,
    ) -> Option<&'v Value> {
        if let Some(value) = frame.values[slot] {
            return value;
        }

        let value = match &self.slots[slot] {
            SlotDef::Root => instance,
            SlotDef::Member(parent, key) => self
                .load(instance, frame, *parent)
                .and_then(Value::as_object)
                .and_then(|obj| obj.get(key)),
        };

        #[cfg(test)]
        {
            frame.loads += 1;
        }
        frame.values[slot] = Some(value);
        value
    }
}

impl Default for Program {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            slots: vec![SlotDef::Root],
            keys: Vec::new(),
            key_sets: Vec::new(),
            source: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(ops: Vec<Op>, slots: Vec<SlotDef>) -> Program {
        Program {
            ops,
            slots,
            keys: vec!["foo".to_owned()],
            key_sets: vec![vec!["foo".to_owned()].into_iter().collect()],
            source: String::new(),
        }
    }

    fn member(parent: Slot, key: &str) -> SlotDef {
        SlotDef::Member(parent, key.to_owned())
    }

    #[test]
    fn empty_program_is_false() {
        assert!(!Program::default().evaluate(Some(&json!({}))));
    }

    #[test]
    fn loads_nested_slots() {
        let p = program(
            vec![Op::IsString(2)],
            vec![SlotDef::Root, member(0, "foo"), member(1, "bar")],
        );

        assert!(p.evaluate(Some(&json!({"foo": {"bar": ""}}))));
        assert!(!p.evaluate(Some(&json!({"foo": {"bar": 1}}))));
        assert!(!p.evaluate(Some(&json!({"foo": "bar"}))));
        assert!(!p.evaluate(None));
    }

    #[test]
    fn each_slot_is_loaded_once() {
        let p = program(
            vec![
                Op::IsObject(1),
                Op::IsNull(2),
                Op::IsAbsent(2),
                Op::IsString(2),
                Op::IsObject(1),
            ],
            vec![SlotDef::Root, member(0, "foo"), member(1, "bar")],
        );
        let instance = json!({"foo": {"bar": ""}});

        let mut frame = Frame::new(p.slots.len());
        assert!(p.run(Some(&instance), &mut frame));
        assert_eq!(3, frame.loads);
    }

    #[test]
    fn jumps() {
        // IsObject(root) && Has(root, "foo"), else false
        let p = program(
            vec![Op::IsObject(0), Op::JumpIfFalse(3), Op::Has(0, 0)],
            vec![SlotDef::Root],
        );

        assert!(p.evaluate(Some(&json!({"foo": null}))));
        assert!(!p.evaluate(Some(&json!({"bar": null}))));
        assert!(!p.evaluate(Some(&json!([]))));

        let p = program(
            vec![Op::IsNull(0), Op::JumpIfTrue(3), Op::Const(false)],
            vec![SlotDef::Root],
        );

        assert!(p.evaluate(Some(&json!(null))));
        assert!(!p.evaluate(Some(&json!(1))));
    }

    #[test]
    fn only_keys() {
        let p = program(vec![Op::OnlyKeys(0, 0)], vec![SlotDef::Root]);

        assert!(p.evaluate(Some(&json!({}))));
        assert!(p.evaluate(Some(&json!({"foo": 1}))));
        assert!(!p.evaluate(Some(&json!({"foo": 1, "bar": 2}))));
        assert!(!p.evaluate(Some(&json!("foo"))));
    }
}
