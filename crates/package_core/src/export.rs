use anyhow::{Context, Result};
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Writer,
};
use shared::domain::Package;

/// Serializes `packages` as `<packages><package id=".." version=".."/>...</packages>`.
pub fn packages_to_xml(packages: &[Package]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("packages")))?;
    for package in packages {
        let version = package.version.to_string();
        let element = BytesStart::new("package")
            .with_attributes([("id", package.id.as_str()), ("version", version.as_str())]);
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("packages")))?;

    String::from_utf8(writer.into_inner()).context("package export is not valid utf-8")
}
