use crate::vm::{NativeRegistry, Value, Vm, VmError, VmResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum BuiltinFunction {
    Print,
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
    Not,
    Concat,
}

impl BuiltinFunction {
    pub(crate) const ALL: [BuiltinFunction; 10] = [
        BuiltinFunction::Print,
        BuiltinFunction::Add,
        BuiltinFunction::Sub,
        BuiltinFunction::Mul,
        BuiltinFunction::Div,
        BuiltinFunction::Eq,
        BuiltinFunction::Lt,
        BuiltinFunction::Gt,
        BuiltinFunction::Not,
        BuiltinFunction::Concat,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            BuiltinFunction::Print => "print",
            BuiltinFunction::Add => "add",
            BuiltinFunction::Sub => "sub",
            BuiltinFunction::Mul => "mul",
            BuiltinFunction::Div => "div",
            BuiltinFunction::Eq => "eq",
            BuiltinFunction::Lt => "lt",
            BuiltinFunction::Gt => "gt",
            BuiltinFunction::Not => "not",
            BuiltinFunction::Concat => "concat",
        }
    }

    fn call(self, vm: &mut Vm, args: &[Value]) -> VmResult<()> {
        match self {
            BuiltinFunction::Print => {
                let rendered = args.iter().map(Value::to_string).collect::<Vec<_>>();
                println!("{}", rendered.join(" "));
            }
            BuiltinFunction::Add => {
                let total = int_args(args)?
                    .into_iter()
                    .try_fold(0i64, i64::checked_add)
                    .ok_or_else(|| VmError::Native("integer overflow in add".to_string()))?;
                vm.push(Value::Int(total));
            }
            BuiltinFunction::Sub => {
                let [lhs, rhs] = int_pair(args)?;
                let value = lhs
                    .checked_sub(rhs)
                    .ok_or_else(|| VmError::Native("integer overflow in sub".to_string()))?;
                vm.push(Value::Int(value));
            }
            BuiltinFunction::Mul => {
                let product = int_args(args)?
                    .into_iter()
                    .try_fold(1i64, i64::checked_mul)
                    .ok_or_else(|| VmError::Native("integer overflow in mul".to_string()))?;
                vm.push(Value::Int(product));
            }
            BuiltinFunction::Div => {
                let [lhs, rhs] = int_pair(args)?;
                if rhs == 0 {
                    return Err(VmError::Native("division by zero".to_string()));
                }
                vm.push(Value::Int(lhs.wrapping_div(rhs)));
            }
            BuiltinFunction::Eq => {
                let [lhs, rhs] = exact::<2>(args)?;
                vm.push(Value::Bool(lhs == rhs));
            }
            BuiltinFunction::Lt => {
                let [lhs, rhs] = int_pair(args)?;
                vm.push(Value::Bool(lhs < rhs));
            }
            BuiltinFunction::Gt => {
                let [lhs, rhs] = int_pair(args)?;
                vm.push(Value::Bool(lhs > rhs));
            }
            BuiltinFunction::Not => {
                let [value] = exact::<1>(args)?;
                vm.push(Value::Bool(value.is_falsy()));
            }
            BuiltinFunction::Concat => {
                let mut out = String::new();
                for arg in args {
                    match arg {
                        Value::String(text) => out.push_str(text),
                        other => {
                            return Err(VmError::TypeMismatch {
                                expected: "string",
                                found: other.type_name(),
                            });
                        }
                    }
                }
                vm.push(Value::String(out));
            }
        }
        Ok(())
    }
}

/// Registers the default natives (`print`, arithmetic, comparisons, `not`,
/// `concat`).
pub fn register_builtins(registry: &mut NativeRegistry) {
    for builtin in BuiltinFunction::ALL {
        registry.register(builtin.name(), move |vm: &mut Vm, args: &[Value]| {
            builtin.call(vm, args)
        });
    }
}

impl NativeRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = NativeRegistry::new();
        register_builtins(&mut registry);
        registry
    }
}

fn exact<const N: usize>(args: &[Value]) -> VmResult<&[Value; N]> {
    args.try_into().map_err(|_| VmError::ArityMismatch {
        expected: N,
        got: args.len(),
    })
}

fn as_int(value: &Value) -> VmResult<i64> {
    match value {
        Value::Int(value) => Ok(*value),
        other => Err(VmError::TypeMismatch {
            expected: "int",
            found: other.type_name(),
        }),
    }
}

fn int_args(args: &[Value]) -> VmResult<Vec<i64>> {
    args.iter().map(as_int).collect()
}

fn int_pair(args: &[Value]) -> VmResult<[i64; 2]> {
    let [lhs, rhs] = exact::<2>(args)?;
    Ok([as_int(lhs)?, as_int(rhs)?])
}
