use super::*;
use crate::lower::is_yield_call;

const STRING_INDEX: &str = "java.lang.StringIndexOutOfBoundsException";

/// An assignable location.
enum Place {
    Var(String),
    Field(ObjRef, String),
    Slot(ListRef, usize),
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Char(c) => Value::Char(*c),
        Literal::Str(s) => Value::str(s),
    }
}

fn as_int(value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Char(c) => Ok(i64::from(u32::from(*c))),
        other => {
            Err(RuntimeError::mismatch(format!("expected a number, found {}", other.type_name())))
        }
    }
}

fn index_of(value: &Value, len: usize, class: &str) -> Result<usize, RuntimeError> {
    let at = as_int(value)?;
    usize::try_from(at)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| RuntimeError::thrown(class))
}

fn no_field(value: &Value, field: &str) -> RuntimeError {
    RuntimeError::mismatch(format!("{} has no field '{field}'", value.type_name()))
}

pub(crate) fn binary_op(
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> Result<Value, RuntimeError> {
    use BinaryOp::*;
    match (op, left, right) {
        (Add, Value::Str(_), _) | (Add, _, Value::Str(_)) => {
            Ok(Value::str(&format!("{left}{right}")))
        }
        (Eq, ..) => Ok(Value::Bool(left == right)),
        (NotEq, ..) => Ok(Value::Bool(left != right)),
        (BitAnd, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a & *b)),
        (BitOr, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a | *b)),
        (BitXor, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a ^ *b)),
        _ => {
            let (a, b) = (as_int(left)?, as_int(right)?);
            let value = match op {
                Add => Value::Int(a.wrapping_add(b)),
                Sub => Value::Int(a.wrapping_sub(b)),
                Mul => Value::Int(a.wrapping_mul(b)),
                Div | Rem if b == 0 => {
                    return Err(RuntimeError::thrown("java.lang.ArithmeticException"));
                }
                Div => Value::Int(a.wrapping_div(b)),
                Rem => Value::Int(a.wrapping_rem(b)),
                Lt => Value::Bool(a < b),
                Gt => Value::Bool(a > b),
                LtEq => Value::Bool(a <= b),
                GtEq => Value::Bool(a >= b),
                LShift => Value::Int(a.wrapping_shl((b & 63) as u32)),
                RShift => Value::Int(a.wrapping_shr((b & 63) as u32)),
                BitAnd => Value::Int(a & b),
                BitOr => Value::Int(a | b),
                BitXor => Value::Int(a ^ b),
                Eq | NotEq => unreachable!("handled above"),
            };
            Ok(value)
        }
    }
}

fn cast(ty: &TypeRef, value: Value) -> Result<Value, RuntimeError> {
    match ty.name() {
        Some("int" | "long" | "short" | "byte") if !matches!(value, Value::Int(_)) => {
            Ok(Value::Int(as_int(&value)?))
        }
        Some("char") if !matches!(value, Value::Char(_)) => {
            let code = u32::try_from(as_int(&value)?).ok().and_then(char::from_u32);
            code.map(Value::Char)
                .ok_or_else(|| RuntimeError::mismatch("not a character code"))
        }
        _ => Ok(value),
    }
}

fn instance_of(value: &Value, ty: &TypeRef) -> bool {
    let Some(name) = ty.simple_name() else {
        return matches!(value, Value::Array(_));
    };
    match value {
        Value::Null => false,
        _ if name == "Object" => true,
        Value::Bool(_) => name == "Boolean",
        Value::Int(_) => matches!(name, "Integer" | "Long" | "Number"),
        Value::Char(_) => name == "Character",
        Value::Str(_) => matches!(name, "String" | "CharSequence"),
        Value::Array(_) => false,
        Value::List(_) => matches!(name, "List" | "ArrayList" | "Collection" | "Iterable"),
        Value::ListIter(_) => name == "Iterator",
        Value::Object(obj) => {
            let obj = obj.borrow();
            let implements = &obj.class.decl.implements;
            obj.class_name() == name || implements.iter().any(|t| t.simple_name() == Some(name))
        }
        Value::Exception(class) => {
            class.rsplit('.').next() == Some(name) || matches!(name, "Exception" | "Throwable")
        }
    }
}

impl Interpreter {
    pub(crate) fn eval(&mut self, expr: &Expression, frame: &Frame) -> Result<Value, RuntimeError> {
        match expr {
            Expression::Literal(lit) => Ok(literal(lit)),
            Expression::Name(n) => self
                .lookup(n, frame)
                .ok_or_else(|| RuntimeError::UnknownName(n.clone())),
            Expression::This => frame
                .this
                .clone()
                .map(Value::Object)
                .ok_or_else(|| RuntimeError::UnknownName("this".into())),
            Expression::Super => Err(RuntimeError::mismatch("super is not supported")),
            Expression::QualifiedThis(class) => {
                let simple = class.rsplit('.').next().unwrap_or(class);
                let mut cursor = frame.this.clone();
                while let Some(obj) = cursor {
                    if obj.borrow().class_name() == simple {
                        return Ok(Value::Object(obj));
                    }
                    cursor = obj.borrow().class.outer_this.clone();
                }
                Err(RuntimeError::UnknownName(format!("{class}.this")))
            }
            Expression::Field(target, field) => self.eval_field(target, field, frame),
            Expression::Call(call) => self.eval_call(call, frame),
            Expression::New(ty, args) => {
                let args = self.eval_args(args, frame)?;
                self.instantiate_type(ty, args, frame)
            }
            Expression::NewArray(element, dims, init) => match init {
                Some(items) => self.eval_array(items, frame),
                None => {
                    let dims = self.eval_args(dims, frame)?;
                    self.allocate(element, &dims)
                }
            },
            Expression::ArrayInit(items) => self.eval_array(items, frame),
            Expression::Index(..) => {
                let place = self.place(expr, frame)?;
                self.read(&place, frame)
            }
            Expression::Unary(op, operand) => {
                let value = self.eval(operand, frame)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Not, other) => {
                        Err(RuntimeError::mismatch(format!("cannot negate {}", other.type_name())))
                    }
                    (UnaryOp::Minus, v) => Ok(Value::Int(as_int(&v)?.wrapping_neg())),
                    (UnaryOp::Plus, v) => Ok(Value::Int(as_int(&v)?)),
                    (UnaryOp::BitNot, v) => Ok(Value::Int(!as_int(&v)?)),
                }
            }
            Expression::Update(op, prefix, target) => {
                let place = self.place(target, frame)?;
                let old = self.read(&place, frame)?;
                let delta = match op {
                    UpdateOp::Increment => 1,
                    UpdateOp::Decrement => -1,
                };
                let new = match &old {
                    Value::Char(_) => {
                        cast(&TypeRef::simple("char"), Value::Int(as_int(&old)? + delta))?
                    }
                    _ => Value::Int(as_int(&old)?.wrapping_add(delta)),
                };
                self.write(&place, new.clone(), frame)?;
                Ok(if *prefix { new } else { old })
            }
            Expression::Binary(op, left, right) => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                binary_op(*op, &left, &right)
            }
            Expression::Logical(op, left, right) => {
                let left = self.eval(left, frame)?;
                let short = match op {
                    LogicalOp::And => !self.truthy(&left)?,
                    LogicalOp::Or => self.truthy(&left)?,
                };
                if short {
                    return Ok(left);
                }
                let right = self.eval(right, frame)?;
                self.truthy(&right)?;
                Ok(right)
            }
            Expression::Assign(op, target, value) => {
                let place = self.place(target, frame)?;
                let value = self.eval(value, frame)?;
                let value = match op.binary() {
                    Some(bin) => {
                        let current = self.read(&place, frame)?;
                        binary_op(bin, &current, &value)?
                    }
                    None => value,
                };
                self.write(&place, value.clone(), frame)?;
                Ok(value)
            }
            Expression::Conditional(test, then, otherwise) => {
                let test = self.eval(test, frame)?;
                if self.truthy(&test)? {
                    self.eval(then, frame)
                } else {
                    self.eval(otherwise, frame)
                }
            }
            Expression::Cast(ty, operand) => {
                let value = self.eval(operand, frame)?;
                cast(ty, value)
            }
            Expression::InstanceOf(operand, ty) => {
                let value = self.eval(operand, frame)?;
                Ok(Value::Bool(instance_of(&value, ty)))
            }
        }
    }

    fn eval_args(
        &mut self,
        args: &[Expression],
        frame: &Frame,
    ) -> Result<Vec<Value>, RuntimeError> {
        args.iter().map(|a| self.eval(a, frame)).collect()
    }

    pub(crate) fn eval_array(
        &mut self,
        items: &[Expression],
        frame: &Frame,
    ) -> Result<Value, RuntimeError> {
        let items = self.eval_args(items, frame)?;
        Ok(Value::Array(Rc::new(RefCell::new(items))))
    }

    fn allocate(&self, element: &TypeRef, dims: &[Value]) -> Result<Value, RuntimeError> {
        let Some((first, rest)) = dims.split_first() else {
            return Ok(Value::default_for(element));
        };
        let len = usize::try_from(as_int(first)?)
            .map_err(|_| RuntimeError::thrown("java.lang.NegativeArraySizeException"))?;
        let items = (0..len)
            .map(|_| {
                if rest.is_empty() {
                    Ok(Value::default_for(element))
                } else {
                    self.allocate(element, rest)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(Rc::new(RefCell::new(items))))
    }

    /// Locals first, then the fields and captured variables of each
    /// enclosing instance, innermost first.
    pub(crate) fn lookup(&self, name: &str, frame: &Frame) -> Option<Value> {
        if let Some(value) = frame.env.borrow().get(name) {
            return Some(value);
        }
        let mut cursor = frame.this.clone();
        while let Some(obj) = cursor {
            let obj = obj.borrow();
            if let Some(value) = obj.fields.get(name) {
                return Some(value.clone());
            }
            if let Some(value) = obj.class.captured.borrow().get(name) {
                return Some(value);
            }
            cursor = obj.class.outer_this.clone();
        }
        None
    }

    fn assign_name(&self, name: &str, value: Value, frame: &Frame) -> Result<(), RuntimeError> {
        if frame.env.borrow_mut().set(name, value.clone()) {
            return Ok(());
        }
        let mut cursor = frame.this.clone();
        while let Some(obj) = cursor {
            let mut obj = obj.borrow_mut();
            if let Some(slot) = obj.fields.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            cursor = obj.class.outer_this.clone();
        }
        Err(RuntimeError::UnknownName(name.to_string()))
    }

    pub(crate) fn find_class(&self, name: &str, frame: &Frame) -> Option<Rc<ClassInfo>> {
        let simple = name.rsplit('.').next().unwrap_or(name);
        if let Some(class) = frame.env.borrow().class(simple) {
            return Some(class);
        }
        let mut cursor = frame.this.clone();
        while let Some(obj) = cursor {
            let obj = obj.borrow();
            if let Some(class) = obj.class.captured.borrow().class(simple) {
                return Some(class);
            }
            cursor = obj.class.outer_this.clone();
        }
        self.global_env.borrow().class(simple)
    }

    fn place(&mut self, target: &Expression, frame: &Frame) -> Result<Place, RuntimeError> {
        match target {
            Expression::Name(n) => Ok(Place::Var(n.clone())),
            Expression::Field(owner, field) => match self.eval(owner, frame)? {
                Value::Object(obj) => Ok(Place::Field(obj, field.clone())),
                other => Err(no_field(&other, field)),
            },
            Expression::Index(array, at) => {
                let array = self.eval(array, frame)?;
                let at = self.eval(at, frame)?;
                match array {
                    Value::Array(items) => {
                        let len = items.borrow().len();
                        let i = index_of(&at, len, "java.lang.ArrayIndexOutOfBoundsException")?;
                        Ok(Place::Slot(items, i))
                    }
                    other => {
                        Err(RuntimeError::mismatch(format!("cannot index {}", other.type_name())))
                    }
                }
            }
            _ => Err(RuntimeError::mismatch("expression is not assignable")),
        }
    }

    fn read(&self, place: &Place, frame: &Frame) -> Result<Value, RuntimeError> {
        match place {
            Place::Var(n) => self
                .lookup(n, frame)
                .ok_or_else(|| RuntimeError::UnknownName(n.clone())),
            Place::Field(obj, field) => obj
                .borrow()
                .field(field)
                .cloned()
                .ok_or_else(|| RuntimeError::UnknownName(field.clone())),
            Place::Slot(items, i) => Ok(items.borrow()[*i].clone()),
        }
    }

    fn write(&self, place: &Place, value: Value, frame: &Frame) -> Result<(), RuntimeError> {
        match place {
            Place::Var(n) => self.assign_name(n, value, frame),
            Place::Field(obj, field) => {
                obj.borrow_mut().fields.insert(field.clone(), value);
                Ok(())
            }
            Place::Slot(items, i) => {
                items.borrow_mut()[*i] = value;
                Ok(())
            }
        }
    }

    /// A dotted name that does not resolve to a value, such as `System.out`.
    fn static_path(&self, expr: &Expression, frame: &Frame) -> Option<String> {
        match expr {
            Expression::Name(n)
                if self.lookup(n, frame).is_none() && self.find_class(n, frame).is_none() =>
            {
                Some(n.clone())
            }
            Expression::Field(owner, field) => self
                .static_path(owner, frame)
                .map(|p| format!("{p}.{field}")),
            _ => None,
        }
    }

    fn eval_field(
        &mut self,
        owner: &Expression,
        field: &str,
        frame: &Frame,
    ) -> Result<Value, RuntimeError> {
        if let Some(path) = self.static_path(owner, frame) {
            return match (path.trim_start_matches("java.lang."), field) {
                ("Integer", "MAX_VALUE") => Ok(Value::Int(i64::from(i32::MAX))),
                ("Integer", "MIN_VALUE") => Ok(Value::Int(i64::from(i32::MIN))),
                _ => Err(RuntimeError::UnknownName(format!("{path}.{field}"))),
            };
        }
        match self.eval(owner, frame)? {
            Value::Array(items) if field == "length" => Ok(Value::Int(items.borrow().len() as i64)),
            Value::Object(obj) => {
                let value = obj.borrow().field(field).cloned();
                value.ok_or_else(|| RuntimeError::UnknownName(field.to_string()))
            }
            other => Err(no_field(&other, field)),
        }
    }

    fn eval_call(&mut self, call: &MethodCall, frame: &Frame) -> Result<Value, RuntimeError> {
        if is_yield_call(call) {
            return Err(RuntimeError::UnloweredYield);
        }
        match call.receiver.as_deref() {
            None => {
                let args = self.eval_args(&call.args, frame)?;
                self.call_unqualified(&call.name, args, frame)
            }
            Some(owner) => {
                if let Some(path) = self.static_path(owner, frame) {
                    let args = self.eval_args(&call.args, frame)?;
                    return self.call_static(&path, &call.name, args);
                }
                let receiver = self.eval(owner, frame)?;
                let args = self.eval_args(&call.args, frame)?;
                self.call_method(&receiver, &call.name, args)
            }
        }
    }

    fn call_unqualified(
        &mut self,
        name: &str,
        args: Vec<Value>,
        frame: &Frame,
    ) -> Result<Value, RuntimeError> {
        let mut cursor = frame.this.clone();
        while let Some(obj) = cursor {
            let class = obj.borrow().class.clone();
            if let Some(method) = class.method(name, args.len()) {
                return self.run_method(&obj, method, args);
            }
            cursor = class.outer_this.clone();
        }
        Err(RuntimeError::UnknownMethod {
            owner: "<this>".into(),
            name: name.to_string(),
            arity: args.len(),
        })
    }

    fn call_static(
        &mut self,
        path: &str,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let owner = path
            .strip_prefix("java.lang.")
            .or_else(|| path.strip_prefix("java.util."))
            .unwrap_or(path);
        if matches!((owner, name), ("Arrays", "asList") | ("List", "of")) {
            return Ok(Value::list(args));
        }
        match (owner, name, args.as_slice()) {
            ("System.out", "println", []) => self.output.push(String::new()),
            ("System.out", "println", [value]) => self.output.push(value.to_string()),
            ("String", "valueOf", [value]) => return Ok(Value::str(&value.to_string())),
            ("Integer", "valueOf", [value]) => return Ok(Value::Int(as_int(value)?)),
            ("Math", "max", [a, b]) => return Ok(Value::Int(as_int(a)?.max(as_int(b)?))),
            ("Math", "min", [a, b]) => return Ok(Value::Int(as_int(a)?.min(as_int(b)?))),
            ("Math", "abs", [a]) => return Ok(Value::Int(as_int(a)?.wrapping_abs())),
            _ => {
                return Err(RuntimeError::UnknownMethod {
                    owner: path.to_string(),
                    name: name.to_string(),
                    arity: args.len(),
                });
            }
        }
        Ok(Value::Null)
    }

    pub(crate) fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let unknown = |args: &[Value]| RuntimeError::UnknownMethod {
            owner: receiver.type_name(),
            name: name.to_string(),
            arity: args.len(),
        };
        match receiver {
            Value::Object(obj) => {
                let class = obj.borrow().class.clone();
                if let Some(method) = class.method(name, args.len()) {
                    return self.run_method(obj, method, args);
                }
                match (name, args.as_slice()) {
                    ("equals", [other]) => Ok(Value::Bool(receiver == other)),
                    ("toString", []) => Ok(Value::str(&receiver.to_string())),
                    _ => Err(unknown(&args)),
                }
            }
            Value::List(items) => match (name, args.as_slice()) {
                ("size", []) => Ok(Value::Int(items.borrow().len() as i64)),
                ("isEmpty", []) => Ok(Value::Bool(items.borrow().is_empty())),
                ("get", [at]) => {
                    let len = items.borrow().len();
                    let i = index_of(at, len, "java.lang.IndexOutOfBoundsException")?;
                    Ok(items.borrow()[i].clone())
                }
                ("add", [value]) => {
                    items.borrow_mut().push(value.clone());
                    Ok(Value::Bool(true))
                }
                ("contains", [value]) => Ok(Value::Bool(items.borrow().contains(value))),
                ("iterator", []) => {
                    let cursor = ListCursor {
                        items: items.clone(),
                        pos: 0,
                    };
                    Ok(Value::ListIter(Rc::new(RefCell::new(cursor))))
                }
                _ => Err(unknown(&args)),
            },
            Value::ListIter(cursor) => match (name, args.as_slice()) {
                ("hasNext", []) => {
                    let cursor = cursor.borrow();
                    Ok(Value::Bool(cursor.pos < cursor.items.borrow().len()))
                }
                ("next", []) => {
                    let mut cursor = cursor.borrow_mut();
                    let item = cursor.items.borrow().get(cursor.pos).cloned();
                    let Some(item) = item else {
                        return Err(RuntimeError::thrown("java.util.NoSuchElementException"));
                    };
                    cursor.pos += 1;
                    Ok(item)
                }
                ("remove", []) => {
                    Err(RuntimeError::thrown("java.lang.UnsupportedOperationException"))
                }
                _ => Err(unknown(&args)),
            },
            Value::Str(s) => match (name, args.as_slice()) {
                ("length", []) => Ok(Value::Int(s.chars().count() as i64)),
                ("isEmpty", []) => Ok(Value::Bool(s.is_empty())),
                ("charAt", [at]) => {
                    let i = index_of(at, s.chars().count(), STRING_INDEX)?;
                    s.chars()
                        .nth(i)
                        .map(Value::Char)
                        .ok_or_else(|| RuntimeError::thrown(STRING_INDEX))
                }
                ("equals", [other]) => Ok(Value::Bool(receiver == other)),
                ("toUpperCase", []) => Ok(Value::str(&s.to_uppercase())),
                _ => Err(unknown(&args)),
            },
            Value::Exception(_) => match name {
                "getMessage" => Ok(Value::Null),
                _ => Err(unknown(&args)),
            },
            Value::Null => Err(RuntimeError::thrown("java.lang.NullPointerException")),
            _ => Err(unknown(&args)),
        }
    }

    fn instantiate_type(
        &mut self,
        ty: &TypeRef,
        args: Vec<Value>,
        frame: &Frame,
    ) -> Result<Value, RuntimeError> {
        let Some(name) = ty.name() else {
            return Err(RuntimeError::mismatch("cannot instantiate an array type with new"));
        };
        if let Some(class) = self.find_class(name, frame) {
            return self.construct(&class, args);
        }
        match ty.simple_name().unwrap_or(name) {
            "ArrayList" | "LinkedList" => Ok(Value::list(Vec::new())),
            simple if simple.ends_with("Exception") || simple.ends_with("Error") => {
                Ok(Value::Exception(Rc::from(name)))
            }
            _ => Err(RuntimeError::UnknownClass(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_concatenation_wins_over_addition() {
        let v = binary_op(BinaryOp::Add, &Value::str("n="), &Value::Int(3)).unwrap();
        assert_eq!(v, Value::str("n=3"));
    }

    #[test]
    fn division_by_zero_throws() {
        assert_eq!(
            binary_op(BinaryOp::Rem, &Value::Int(1), &Value::Int(0)),
            Err(RuntimeError::thrown("java.lang.ArithmeticException"))
        );
    }

    #[test]
    fn chars_compare_as_numbers() {
        let v = binary_op(BinaryOp::Lt, &Value::Char('a'), &Value::Int(98)).unwrap();
        assert_eq!(v, Value::Bool(true));
        assert_eq!(
            cast(&TypeRef::simple("char"), Value::Int(65)).unwrap(),
            Value::Char('A')
        );
    }
}
