#![no_main]
use libfuzzer_sys::fuzz_target;
use safe_parcel::{RawObject, Result};
use serde::Deserialize;

#[allow(dead_code)]
#[derive(Deserialize)]
struct Inner {
    id: i64,
    name: Option<String>,
}

#[allow(dead_code)]
#[derive(Deserialize)]
struct Message {
    flag: bool,
    count: i32,
    text: String,
    #[serde(default)]
    values: Vec<f64>,
    inner: Option<Inner>,
    #[serde(default)]
    children: Vec<Option<Inner>>,
}

fn walk(object: RawObject) -> Result<()> {
    for field in object.fields() {
        let field = field?;
        if field.looks_like_object() {
            walk(field.as_object()?)?;
        }
    }
    Ok(())
}

fuzz_target!(|data: &[u8]| {
    if let Ok(object) = RawObject::parse(data) {
        let _ = walk(object);
    }
    let _ = safe_parcel::from_slice::<Message>(data);
});
