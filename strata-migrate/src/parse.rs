//! Parsing textual step expressions back into [`Step`] values.
//!
//! The vocabulary is fixed (`create`, `drop`, `alter`, `get`, `set`, `add`),
//! so a small recursive-descent parser over the surface forms is enough.
//! Parsing is all-or-nothing: a malformed expression fails with
//! [`MigrateError::MalformedStep`] and the caller treats the whole artifact
//! as unusable.

use serde_json::{Map, Value};
use strata_schema::{
    Field, FieldType, Index, IndexField, LinkKind, Model, Trigger, TriggerAction, TriggerWhen,
};

use crate::error::{MigrateError, MigrateResult};
use crate::step::Step;

/// Parse a single step expression.
pub fn parse_step(input: &str) -> MigrateResult<Step> {
    let mut parser = Parser::new(input);
    let step = parser.step()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.fail("trailing characters after step"));
    }
    Ok(step)
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn fail(&self, reason: &str) -> MigrateError {
        MigrateError::malformed_step(format!("{reason} in '{}'", self.src))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: u8) -> MigrateResult<()> {
        self.skip_ws();
        match self.bump() {
            Some(b) if b == expected => Ok(()),
            _ => Err(self.fail(&format!("expected '{}'", expected as char))),
        }
    }

    /// Consume a literal sequence of characters (no embedded whitespace).
    fn expect_str(&mut self, expected: &str) -> MigrateResult<()> {
        self.skip_ws();
        if self.src[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            Ok(())
        } else {
            Err(self.fail(&format!("expected '{expected}'")))
        }
    }

    fn ident(&mut self) -> MigrateResult<String> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.fail("expected identifier"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// A string in either quote style with backslash escapes.
    fn string(&mut self) -> MigrateResult<String> {
        self.skip_ws();
        let delim = match self.bump() {
            Some(b @ (b'"' | b'\'')) => b,
            _ => return Err(self.fail("expected string")),
        };
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.fail("unterminated string")),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b't') => out.push(b'\t'),
                    Some(c) => out.push(c),
                    None => return Err(self.fail("unterminated escape")),
                },
                Some(b) if b == delim => break,
                Some(b) => out.push(b),
            }
        }
        String::from_utf8(out).map_err(|_| self.fail("invalid UTF-8 in string"))
    }

    fn value(&mut self) -> MigrateResult<Value> {
        self.skip_ws();
        match self.peek() {
            Some(b'"' | b'\'') => Ok(Value::String(self.string()?)),
            Some(b'{') => self.object().map(Value::Object),
            Some(b'[') => self.array(),
            Some(b) if b.is_ascii_digit() || b == b'-' => self.number(),
            Some(_) => {
                let word = self.ident()?;
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" => Ok(Value::Null),
                    _ => Err(self.fail(&format!("unexpected token '{word}'"))),
                }
            }
            None => Err(self.fail("expected value")),
        }
    }

    fn number(&mut self) -> MigrateResult<Value> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_digit() || b == b'.' || b == b'e' || b == b'E' || b == b'+' || b == b'-')
        {
            self.pos += 1;
        }
        serde_json::from_str(&self.src[start..self.pos])
            .map_err(|_| self.fail("invalid number"))
    }

    /// Object literal with bare or quoted keys.
    fn object(&mut self) -> MigrateResult<Map<String, Value>> {
        self.expect(b'{')?;
        let mut map = Map::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(map);
        }
        loop {
            self.skip_ws();
            let key = match self.peek() {
                Some(b'"' | b'\'') => self.string()?,
                _ => self.ident()?,
            };
            self.expect(b':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => break,
                _ => return Err(self.fail("expected ',' or '}'")),
            }
        }
        Ok(map)
    }

    fn array(&mut self) -> MigrateResult<Value> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => break,
                _ => return Err(self.fail("expected ',' or ']'")),
            }
        }
        Ok(Value::Array(items))
    }

    fn step(&mut self) -> MigrateResult<Step> {
        let head = self.ident()?;
        match head.as_str() {
            "create" => self.create_model(),
            "drop" => self.drop_model(),
            "alter" => self.alter(),
            "add" => self.copy_model(),
            "set" => self.set(),
            other => Err(self.fail(&format!("unknown operation '{other}'"))),
        }
    }

    fn create_model(&mut self) -> MigrateResult<Step> {
        self.expect_str(".model")?;
        self.expect(b'(')?;
        let obj = self.object()?;
        self.expect(b')')?;
        Ok(Step::CreateModel {
            model: model_from_object(&obj).map_err(|e| self.contextualize(e))?,
        })
    }

    fn drop_model(&mut self) -> MigrateResult<Step> {
        self.expect_str(".model")?;
        self.expect(b'(')?;
        let model = self.string()?;
        self.expect(b')')?;
        Ok(Step::DropModel { model })
    }

    fn alter(&mut self) -> MigrateResult<Step> {
        self.expect_str(".model")?;
        self.expect(b'(')?;
        let model = self.string()?;
        self.expect(b')')?;
        self.expect(b'.')?;

        let verb = self.ident()?;
        match verb.as_str() {
            "to" => {
                self.expect(b'(')?;
                let obj = self.object()?;
                self.expect(b')')?;
                self.model_patch(model, obj)
            }
            "create" => {
                self.expect(b'.')?;
                let kind = self.ident()?;
                self.expect(b'(')?;
                let obj = self.object()?;
                self.expect(b')')?;
                match kind.as_str() {
                    "field" => Ok(Step::CreateField {
                        model,
                        field: field_from_object(&obj).map_err(|e| self.contextualize(e))?,
                    }),
                    "index" => Ok(Step::CreateIndex {
                        model,
                        index: index_from_object(&obj).map_err(|e| self.contextualize(e))?,
                    }),
                    "trigger" => Ok(Step::CreateTrigger {
                        model,
                        trigger: trigger_from_object(&obj).map_err(|e| self.contextualize(e))?,
                    }),
                    other => Err(self.fail(&format!("cannot create '{other}'"))),
                }
            }
            "alter" => {
                self.expect_str(".field")?;
                self.expect(b'(')?;
                let field = self.string()?;
                self.expect(b')')?;
                self.expect_str(".to")?;
                self.expect(b'(')?;
                let obj = self.object()?;
                self.expect(b')')?;

                if obj.len() == 1 && obj.contains_key("slug") {
                    let to = expect_string(&obj, "slug").map_err(|e| self.contextualize(e))?;
                    Ok(Step::RenameField { model, from: field, to })
                } else {
                    Ok(Step::AlterField {
                        model,
                        field,
                        to: field_from_object(&obj).map_err(|e| self.contextualize(e))?,
                    })
                }
            }
            "drop" => {
                self.expect(b'.')?;
                let kind = self.ident()?;
                self.expect(b'(')?;
                let slug = self.string()?;
                self.expect(b')')?;
                match kind.as_str() {
                    "field" => Ok(Step::DropField { model, field: slug }),
                    "index" => Ok(Step::DropIndex { model, index: slug }),
                    "trigger" => Ok(Step::DropTrigger {
                        model,
                        trigger: slug,
                    }),
                    other => Err(self.fail(&format!("cannot drop '{other}'"))),
                }
            }
            other => Err(self.fail(&format!("unknown alter verb '{other}'"))),
        }
    }

    fn model_patch(&mut self, model: String, obj: Map<String, Value>) -> MigrateResult<Step> {
        if obj.len() == 1 && obj.contains_key("slug") {
            let to = expect_string(&obj, "slug").map_err(|e| self.contextualize(e))?;
            return Ok(Step::RenameModel { from: model, to });
        }
        if obj.len() == 1 && obj.contains_key("name") {
            let name = expect_string(&obj, "name").map_err(|e| self.contextualize(e))?;
            return Ok(Step::AlterModelMeta { model, name });
        }
        Err(self.fail("unsupported model patch"))
    }

    /// `add.<to>.with(() => get.<from>())`
    fn copy_model(&mut self) -> MigrateResult<Step> {
        self.expect(b'.')?;
        let to = self.ident()?;
        self.expect_str(".with")?;
        self.expect(b'(')?;
        self.expect_str("()")?;
        self.expect_str("=>")?;
        self.expect_str("get.")?;
        let from = self.ident()?;
        self.expect_str("()")?;
        self.expect(b')')?;
        Ok(Step::CopyModelData { from, to })
    }

    /// `set.<m>.to.<f>(...)`: a closure argument is a column copy, a value
    /// argument is a backfill.
    fn set(&mut self) -> MigrateResult<Step> {
        self.expect(b'.')?;
        let model = self.ident()?;
        self.expect_str(".to.")?;
        let dest = self.ident()?;
        self.expect(b'(')?;
        self.skip_ws();

        let checkpoint = self.pos;
        if let Ok(step) = self.field_closure(&model, &dest) {
            return Ok(step);
        }
        self.pos = checkpoint;

        let value = self.value()?;
        self.expect(b')')?;
        Ok(Step::BackfillField {
            model,
            field: dest,
            value,
        })
    }

    /// `f => f.<src>)`
    fn field_closure(&mut self, model: &str, dest: &str) -> MigrateResult<Step> {
        let param = self.ident()?;
        self.expect_str("=>")?;
        self.expect_str(&format!("{param}."))?;
        let from = self.ident()?;
        self.expect(b')')?;
        Ok(Step::CopyFieldData {
            model: model.to_string(),
            from,
            to: dest.to_string(),
        })
    }

    fn contextualize(&self, err: MigrateError) -> MigrateError {
        match err {
            MigrateError::MalformedStep(reason) => {
                MigrateError::malformed_step(format!("{reason} in '{}'", self.src))
            }
            other => other,
        }
    }
}

fn expect_string(obj: &Map<String, Value>, key: &str) -> MigrateResult<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MigrateError::malformed_step(format!("missing string property '{key}'")))
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn model_from_object(obj: &Map<String, Value>) -> MigrateResult<Model> {
    let mut model = Model::new(expect_string(obj, "slug")?);
    model.plural_slug = optional_string(obj, "pluralSlug");
    model.name = optional_string(obj, "name");
    model.plural_name = optional_string(obj, "pluralName");
    model.id_prefix = optional_string(obj, "idPrefix");

    for item in array_items(obj, "fields")? {
        let field = field_from_object(as_object(item)?)?;
        model.fields.insert(field.slug.clone(), field);
    }
    for item in array_items(obj, "indexes")? {
        let index = index_from_object(as_object(item)?)?;
        model.indexes.insert(index.slug.clone(), index);
    }
    for item in array_items(obj, "triggers")? {
        let trigger = trigger_from_object(as_object(item)?)?;
        model.triggers.insert(trigger.slug.clone(), trigger);
    }
    Ok(model)
}

fn field_from_object(obj: &Map<String, Value>) -> MigrateResult<Field> {
    let slug = expect_string(obj, "slug")?;
    let type_name = expect_string(obj, "type")?;
    let field_type = parse_field_type(&type_name)?;

    let mut field = Field::new(slug, field_type);
    field.name = optional_string(obj, "name");
    field.required = flag(obj, "required");
    field.unique = flag(obj, "unique");
    field.increment = flag(obj, "increment");
    field.default_value = obj.get("defaultValue").cloned();
    field.target = optional_string(obj, "target");
    field.kind = match optional_string(obj, "kind").as_deref() {
        Some("one") => Some(LinkKind::One),
        Some("many") => Some(LinkKind::Many),
        Some(other) => {
            return Err(MigrateError::malformed_step(format!(
                "unknown link kind '{other}'"
            )));
        }
        None => None,
    };
    Ok(field)
}

fn index_from_object(obj: &Map<String, Value>) -> MigrateResult<Index> {
    let slug = expect_string(obj, "slug")?;
    let mut fields = Vec::new();
    for item in array_items(obj, "fields")? {
        fields.push(IndexField::new(expect_string(as_object(item)?, "slug")?));
    }
    Ok(Index {
        slug,
        fields,
        unique: flag(obj, "unique"),
    })
}

fn trigger_from_object(obj: &Map<String, Value>) -> MigrateResult<Trigger> {
    let slug = expect_string(obj, "slug")?;
    let action = match expect_string(obj, "action")?.as_str() {
        "INSERT" => TriggerAction::Insert,
        "UPDATE" => TriggerAction::Update,
        "DELETE" => TriggerAction::Delete,
        other => {
            return Err(MigrateError::malformed_step(format!(
                "unknown trigger action '{other}'"
            )));
        }
    };
    let when = match expect_string(obj, "when")?.as_str() {
        "BEFORE" => TriggerWhen::Before,
        "AFTER" => TriggerWhen::After,
        other => {
            return Err(MigrateError::malformed_step(format!(
                "unknown trigger timing '{other}'"
            )));
        }
    };

    let mut trigger = Trigger::new(slug, action, when);
    if obj.contains_key("fields") {
        let mut fields = Vec::new();
        for item in array_items(obj, "fields")? {
            fields.push(IndexField::new(expect_string(as_object(item)?, "slug")?));
        }
        trigger.fields = Some(fields);
    }
    for item in array_items(obj, "effects")? {
        let effect = item
            .as_str()
            .ok_or_else(|| MigrateError::malformed_step("trigger effect must be a string"))?;
        trigger.effects.push(effect.to_string());
    }
    Ok(trigger)
}

fn parse_field_type(name: &str) -> MigrateResult<FieldType> {
    Ok(match name {
        "string" => FieldType::String,
        "number" => FieldType::Number,
        "boolean" => FieldType::Boolean,
        "date" => FieldType::Date,
        "blob" => FieldType::Blob,
        "json" => FieldType::Json,
        "link" => FieldType::Link,
        other => {
            return Err(MigrateError::malformed_step(format!(
                "unknown field type '{other}'"
            )));
        }
    })
}

fn array_items<'v>(obj: &'v Map<String, Value>, key: &str) -> MigrateResult<&'v [Value]> {
    match obj.get(key) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(MigrateError::malformed_step(format!(
            "property '{key}' must be an array"
        ))),
    }
}

fn as_object(value: &Value) -> MigrateResult<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| MigrateError::malformed_step("expected object literal"))
}
