use super::*;

fn continues(comp: &Completion, labels: &[&str]) -> bool {
    match comp {
        Completion::Continue(None) => true,
        Completion::Continue(Some(l)) => labels.contains(&l.as_str()),
        _ => false,
    }
}

fn breaks(comp: &Completion) -> bool {
    matches!(comp, Completion::Break(None))
}

/// Whether `catch (ty e)` handles an exception of class `thrown`.
fn catches(ty: &TypeRef, thrown: &str) -> bool {
    let Some(caught) = ty.simple_name() else {
        return false;
    };
    let thrown = thrown.rsplit('.').next().unwrap_or(thrown);
    caught == thrown
        || matches!(caught, "Throwable" | "Exception")
        || (caught == "RuntimeException" && !thrown.ends_with("Error"))
}

impl Interpreter {
    pub(crate) fn exec_statements(
        &mut self,
        stmts: &[Statement],
        frame: &Frame,
    ) -> Result<Completion, RuntimeError> {
        for stmt in stmts {
            let comp = self.exec_statement(stmt, frame)?;
            if comp != Completion::Normal {
                return Ok(comp);
            }
        }
        Ok(Completion::Normal)
    }

    pub(crate) fn exec_statement(
        &mut self,
        stmt: &Statement,
        frame: &Frame,
    ) -> Result<Completion, RuntimeError> {
        self.exec_labeled(stmt, frame, &[])
    }

    /// `labels` are the labels directly attached to `stmt`.
    fn exec_labeled(
        &mut self,
        stmt: &Statement,
        frame: &Frame,
        labels: &[&str],
    ) -> Result<Completion, RuntimeError> {
        self.tick()?;
        match stmt {
            Statement::Empty => Ok(Completion::Normal),
            Statement::Expression(e) => {
                self.eval(e, frame)?;
                Ok(Completion::Normal)
            }
            Statement::Block(stmts) => self.exec_statements(stmts, &frame.nested()),
            Statement::Local(decl) => {
                let value = match &decl.init {
                    Some(Expression::ArrayInit(items)) => self.eval_array(items, frame)?,
                    Some(init) => self.eval(init, frame)?,
                    None => Value::default_for(&decl.ty),
                };
                frame.env.borrow_mut().declare(&decl.name, value);
                Ok(Completion::Normal)
            }
            Statement::LocalClass(decl) => {
                let info = Rc::new(ClassInfo {
                    decl: Rc::new(decl.clone()),
                    captured: frame.env.clone(),
                    outer_this: frame.this.clone(),
                });
                frame
                    .env
                    .borrow_mut()
                    .classes
                    .insert(decl.name.clone(), info);
                Ok(Completion::Normal)
            }
            Statement::If(if_stmt) => {
                let test = self.eval(&if_stmt.test, frame)?;
                if self.truthy(&test)? {
                    self.exec_statement(&if_stmt.consequent, frame)
                } else if let Some(alt) = &if_stmt.alternate {
                    self.exec_statement(alt, frame)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Statement::While(w) => {
                loop {
                    let test = self.eval(&w.test, frame)?;
                    if !self.truthy(&test)? {
                        break;
                    }
                    let comp = self.exec_statement(&w.body, frame)?;
                    if breaks(&comp) {
                        break;
                    }
                    if comp != Completion::Normal && !continues(&comp, labels) {
                        return Ok(comp);
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::DoWhile(dw) => {
                loop {
                    let comp = self.exec_statement(&dw.body, frame)?;
                    if breaks(&comp) {
                        break;
                    }
                    if comp != Completion::Normal && !continues(&comp, labels) {
                        return Ok(comp);
                    }
                    let test = self.eval(&dw.test, frame)?;
                    if !self.truthy(&test)? {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::For(f) => self.exec_for(f, frame, labels),
            Statement::ForEach(fe) => self.exec_for_each(fe, frame, labels),
            Statement::Switch(s) => self.exec_switch(s, frame),
            Statement::Labeled(label, inner) => {
                let mut own = labels.to_vec();
                own.push(label.as_str());
                let comp = self.exec_labeled(inner, frame, &own)?;
                match &comp {
                    Completion::Break(Some(l)) if l == label => Ok(Completion::Normal),
                    _ => Ok(comp),
                }
            }
            Statement::Break(label) => Ok(Completion::Break(label.clone())),
            Statement::Continue(label) => Ok(Completion::Continue(label.clone())),
            Statement::Return(e) => {
                let value = match e {
                    Some(e) => self.eval(e, frame)?,
                    None => Value::Null,
                };
                Ok(Completion::Return(value))
            }
            Statement::Throw(e) => match self.eval(e, frame)? {
                Value::Exception(class) => Err(RuntimeError::thrown(&class)),
                Value::Object(obj) => Err(RuntimeError::thrown(obj.borrow().class_name())),
                other => Err(RuntimeError::mismatch(format!("cannot throw {}", other.type_name()))),
            },
            Statement::Try(t) => self.exec_try(t, frame),
        }
    }

    fn exec_for(
        &mut self,
        f: &ForStatement,
        frame: &Frame,
        labels: &[&str],
    ) -> Result<Completion, RuntimeError> {
        let frame = frame.nested();
        for init in &f.init {
            self.exec_statement(init, &frame)?;
        }
        loop {
            if let Some(test) = &f.test {
                let test = self.eval(test, &frame)?;
                if !self.truthy(&test)? {
                    break;
                }
            }
            let comp = self.exec_statement(&f.body, &frame)?;
            if breaks(&comp) {
                break;
            }
            if comp != Completion::Normal && !continues(&comp, labels) {
                return Ok(comp);
            }
            for update in &f.update {
                self.eval(update, &frame)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_for_each(
        &mut self,
        fe: &ForEachStatement,
        frame: &Frame,
        labels: &[&str],
    ) -> Result<Completion, RuntimeError> {
        let source = self.eval(&fe.iterable, frame)?;
        // Arrays and lists are walked over a snapshot; anything else has to
        // speak the iterator protocol.
        let snapshot = match &source {
            Value::Array(items) | Value::List(items) => Some(items.borrow().clone()),
            _ => None,
        };
        let iterator = match &snapshot {
            Some(_) => None,
            None => Some(self.call_method(&source, "iterator", Vec::new())?),
        };
        let mut items = snapshot.into_iter().flatten();

        loop {
            let item = match &iterator {
                None => match items.next() {
                    Some(item) => item,
                    None => break,
                },
                Some(it) => {
                    let more = self.call_method(it, "hasNext", Vec::new())?;
                    if !self.truthy(&more)? {
                        break;
                    }
                    self.call_method(it, "next", Vec::new())?
                }
            };
            let body_frame = frame.nested();
            body_frame.env.borrow_mut().declare(&fe.var.name, item);
            let comp = self.exec_statement(&fe.body, &body_frame)?;
            if breaks(&comp) {
                break;
            }
            if comp != Completion::Normal && !continues(&comp, labels) {
                return Ok(comp);
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_switch(
        &mut self,
        s: &SwitchStatement,
        frame: &Frame,
    ) -> Result<Completion, RuntimeError> {
        let selector = self.eval(&s.selector, frame)?;
        let mut start = None;
        for (i, case) in s.cases.iter().enumerate() {
            if let Some(label) = &case.label
                && self.eval(label, frame)? == selector
            {
                start = Some(i);
                break;
            }
        }
        let start = start.or_else(|| s.cases.iter().position(|c| c.label.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };

        let frame = frame.nested();
        for case in &s.cases[start..] {
            match self.exec_statements(&case.body, &frame)? {
                Completion::Normal => {}
                Completion::Break(None) => return Ok(Completion::Normal),
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(&mut self, t: &TryStatement, frame: &Frame) -> Result<Completion, RuntimeError> {
        let mut result = self.exec_statements(&t.block, &frame.nested());
        let handler = match &result {
            Err(RuntimeError::Thrown { class }) => t
                .catches
                .iter()
                .find(|c| catches(&c.ty, class))
                .map(|c| (c, class.clone())),
            _ => None,
        };
        if let Some((catch, class)) = handler {
            let catch_frame = frame.nested();
            catch_frame
                .env
                .borrow_mut()
                .declare(&catch.name, Value::Exception(Rc::from(class.as_str())));
            result = self.exec_statements(&catch.body, &catch_frame);
        }
        if let Some(finally) = &t.finally {
            match self.exec_statements(finally, &frame.nested())? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }
}
