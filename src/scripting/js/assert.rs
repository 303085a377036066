//! Assertion helpers for the JavaScript bridge
//!
//! Matchers behind `test.expect(...)` and the value formatting used by
//! `console`. They are handed to the bridge as a plain object argument, so
//! user scripts never see them as globals.

use rquickjs::convert::Coerced;
use rquickjs::{Ctx, Function, Object, Value};
use serde_json::Value as JsonValue;

/// Build the helper object passed to the bridge's `run`
pub fn module<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let module = Object::new(ctx.clone())?;

    module.set(
        "status",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, expected: Value<'js>, got: Value<'js>| {
            expect_status(&ctx, expected, got)
        })?,
    )?;
    module.set(
        "equal",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, actual: Value<'js>, expected: Value<'js>| {
            expect_equal(&ctx, actual, expected)
        })?,
    )?;
    module.set(
        "property",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, actual: Value<'js>, key: Value<'js>| {
            expect_property(&ctx, actual, key)
        })?,
    )?;
    module.set(
        "ok",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, actual: Value<'js>| {
            expect_ok(&ctx, actual)
        })?,
    )?;
    module.set(
        "describe",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, value: Value<'js>| describe(&ctx, &value))?,
    )?;

    Ok(module)
}

/// Status code matcher; both sides are compared as numbers
fn expect_status<'js>(
    ctx: &Ctx<'js>,
    expected: Value<'js>,
    got: Value<'js>,
) -> rquickjs::Result<Object<'js>> {
    let expected_text = describe(ctx, &expected)?;
    let got_text = describe(ctx, &got)?;
    let expected_num = expected.get::<Coerced<f64>>()?.0;
    let got_num = got.get::<Coerced<f64>>()?.0;

    outcome(
        ctx,
        format!("Status code is {}", expected_text),
        expected_num == got_num,
        format!("Expected status {} but got {}", expected_text, got_text),
    )
}

/// Deep equality through the JSON form of both values
fn expect_equal<'js>(
    ctx: &Ctx<'js>,
    actual: Value<'js>,
    expected: Value<'js>,
) -> rquickjs::Result<Object<'js>> {
    let actual_text = describe(ctx, &actual)?;
    let expected_text = describe(ctx, &expected)?;
    let passed =
        same_kind(&actual, &expected) && to_json(ctx, &actual)? == to_json(ctx, &expected)?;

    outcome(
        ctx,
        format!("Expected {} to equal {}", actual_text, expected_text),
        passed,
        format!("Expected {} but got {}", expected_text, actual_text),
    )
}

fn expect_property<'js>(
    ctx: &Ctx<'js>,
    actual: Value<'js>,
    key: Value<'js>,
) -> rquickjs::Result<Object<'js>> {
    let key_text = describe(ctx, &key)?;
    let passed = match actual.as_object() {
        Some(object) if !actual.is_function() => {
            object.contains_key(key.get::<Coerced<String>>()?.0)?
        }
        _ => false,
    };

    outcome(
        ctx,
        format!("Expected value to have property {}", key_text),
        passed,
        format!("Property {} is missing", key_text),
    )
}

fn expect_ok<'js>(ctx: &Ctx<'js>, actual: Value<'js>) -> rquickjs::Result<Object<'js>> {
    let text = describe(ctx, &actual)?;
    let passed = actual.get::<Coerced<bool>>()?.0;
    outcome(
        ctx,
        format!("Expected {} to be ok", text),
        passed,
        format!("{} is not truthy", text),
    )
}

/// Strings as-is, everything else as JSON where it has a JSON form
pub fn describe<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> rquickjs::Result<String> {
    if let Some(text) = value.as_string() {
        return text.to_string();
    }
    if value.is_undefined() {
        return Ok("undefined".to_string());
    }
    match ctx.json_stringify(value.clone()) {
        Ok(Some(text)) => text.to_string(),
        // Functions, symbols and cyclic values
        _ => Ok(value.get::<Coerced<String>>()?.0),
    }
}

fn to_json<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> rquickjs::Result<Option<JsonValue>> {
    if value.is_undefined() {
        return Ok(None);
    }
    Ok(match ctx.json_stringify(value.clone()) {
        Ok(Some(text)) => serde_json::from_str(&text.to_string()?).ok(),
        _ => None,
    })
}

/// `null` and `undefined` only equal themselves; NaN equals NaN
fn same_kind(a: &Value<'_>, b: &Value<'_>) -> bool {
    if a.is_undefined() || b.is_undefined() {
        return a.is_undefined() && b.is_undefined();
    }
    let a_nan = a.as_float().is_some_and(f64::is_nan);
    let b_nan = b.as_float().is_some_and(f64::is_nan);
    if a_nan || b_nan {
        return a_nan && b_nan;
    }
    a.is_null() == b.is_null()
}

fn outcome<'js>(
    ctx: &Ctx<'js>,
    name: String,
    passed: bool,
    error: String,
) -> rquickjs::Result<Object<'js>> {
    let entry = Object::new(ctx.clone())?;
    entry.set("name", name)?;
    entry.set("passed", passed)?;
    if !passed {
        entry.set("error", error)?;
    }
    Ok(entry)
}
