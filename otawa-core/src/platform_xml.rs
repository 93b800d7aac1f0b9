//! Cache-hierarchy XML parser (`spec.md` §6): `<cache-config>` with
//! ordered `<icache>`/`<dcache>` children, each carrying `sets`, `ways`,
//! `block-size`, `policy`, `write-policy`, and an optional nested child
//! describing the next cache level out.
//!
//! `quick-xml`'s pull-based `Reader` is used to build a small generic
//! element tree first, then that tree is walked to build the
//! [`crate::program::platform::Platform`] — the same two-pass shape as a
//! hand-rolled recursive-descent parser, just with the tokenizing done
//! by the library instead of by hand.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{OtawaError, Result};
use crate::program::platform::{Cache, Platform, ReplacementPolicy, WritePolicy};

struct Element {
    name: String,
    attrs: HashMap<String, String>,
    children: Vec<Element>,
}

fn invalid(msg: impl Into<String>) -> OtawaError {
    OtawaError::InvalidCacheConfig(msg.into())
}

/// Parse `content` into a generic element tree rooted at the document's
/// single top-level element.
fn parse_tree(content: &str) -> Result<Element> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(|e| invalid(e.to_string()))? {
            Event::Start(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                let attrs = read_attrs(&tag)?;
                stack.push(Element { name, attrs, children: Vec::new() });
            }
            Event::Empty(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                let attrs = read_attrs(&tag)?;
                let element = Element { name, attrs, children: Vec::new() };
                push_child(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| invalid("unbalanced closing tag"))?;
                push_child(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| invalid("empty document"))
}

fn push_child(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn read_attrs(tag: &quick_xml::events::BytesStart) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| invalid(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| invalid(e.to_string()))?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Parse a complete `<cache-config>` document into a [`Platform`].
pub fn parse(content: &str) -> Result<Platform> {
    let root = parse_tree(content)?;
    if root.name != "cache-config" {
        return Err(invalid(format!("expected root element <cache-config>, found <{}>", root.name)));
    }

    let mut platform = Platform::new();
    for child in &root.children {
        match child.name.as_str() {
            "icache" => platform.icache = parse_cache_chain(child)?,
            "dcache" => platform.dcache = parse_cache_chain(child)?,
            other => return Err(invalid(format!("unexpected element <{other}> under <cache-config>"))),
        }
    }
    Ok(platform)
}

/// A cache element and its nested child (if any) describe consecutive
/// levels of one hierarchy, outermost level last in the returned vec.
fn parse_cache_chain(element: &Element) -> Result<Vec<Cache>> {
    let mut levels = vec![parse_cache_attrs(element)?];
    let mut current = element;
    while let Some(next) = current.children.first() {
        levels.push(parse_cache_attrs(next)?);
        current = next;
    }
    for i in 0..levels.len().saturating_sub(1) {
        levels[i].next_level = Some(i + 1);
    }
    Ok(levels)
}

fn parse_cache_attrs(element: &Element) -> Result<Cache> {
    let sets = required_u32(element, "sets")?;
    let ways = required_u32(element, "ways")?;
    let block_size = required_u32(element, "block-size")?;
    let policy = parse_policy(required_attr(element, "policy")?)?;
    let write_policy = parse_write_policy(required_attr(element, "write-policy")?)?;
    let miss_penalty = match element.attrs.get("miss-penalty") {
        Some(value) => value.parse::<i64>().map_err(|_| invalid(format!("<{}> attribute 'miss-penalty' is not a valid integer", element.name)))?,
        None => 0,
    };
    Ok(Cache::new(sets, ways, block_size, policy, write_policy).with_miss_penalty(miss_penalty))
}

fn required_attr<'a>(element: &'a Element, name: &str) -> Result<&'a str> {
    element.attrs.get(name).map(String::as_str).ok_or_else(|| invalid(format!("<{}> missing required attribute '{name}'", element.name)))
}

fn required_u32(element: &Element, name: &str) -> Result<u32> {
    required_attr(element, name)?.parse::<u32>().map_err(|_| invalid(format!("<{}> attribute '{name}' is not a valid integer", element.name)))
}

fn parse_policy(value: &str) -> Result<ReplacementPolicy> {
    match value {
        "LRU" => Ok(ReplacementPolicy::Lru),
        "FIFO" => Ok(ReplacementPolicy::Fifo),
        "random" => Ok(ReplacementPolicy::Random),
        "pseudo-LRU" => Ok(ReplacementPolicy::PseudoLru),
        "none" => Ok(ReplacementPolicy::None),
        other => Err(invalid(format!("unknown cache policy '{other}'"))),
    }
}

fn parse_write_policy(value: &str) -> Result<WritePolicy> {
    match value {
        "write-through" => Ok(WritePolicy::WriteThrough),
        "write-back" => Ok(WritePolicy::WriteBack),
        other => Err(invalid(format!("unknown write policy '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_level_icache() {
        let xml = r#"<cache-config>
            <icache sets="64" ways="4" block-size="32" policy="LRU" write-policy="write-back" />
        </cache-config>"#;
        let platform = parse(xml).unwrap();
        assert_eq!(platform.icache.len(), 1);
        assert_eq!(platform.icache[0].sets, 64);
        assert_eq!(platform.icache[0].associativity, 4);
        assert_eq!(platform.icache[0].policy, ReplacementPolicy::Lru);
        assert_eq!(platform.icache[0].next_level, None);
    }

    #[test]
    fn nested_child_describes_the_next_level() {
        let xml = r#"<cache-config>
            <icache sets="64" ways="2" block-size="32" policy="LRU" write-policy="write-through">
                <icache sets="512" ways="8" block-size="64" policy="LRU" write-policy="write-back" />
            </icache>
        </cache-config>"#;
        let platform = parse(xml).unwrap();
        assert_eq!(platform.icache.len(), 2);
        assert_eq!(platform.icache[0].next_level, Some(1));
        assert_eq!(platform.icache[1].sets, 512);
    }

    #[test]
    fn both_icache_and_dcache_are_parsed() {
        let xml = r#"<cache-config>
            <icache sets="64" ways="4" block-size="32" policy="LRU" write-policy="write-back" />
            <dcache sets="64" ways="4" block-size="32" policy="FIFO" write-policy="write-through" />
        </cache-config>"#;
        let platform = parse(xml).unwrap();
        assert_eq!(platform.icache.len(), 1);
        assert_eq!(platform.dcache[0].policy, ReplacementPolicy::Fifo);
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let xml = r#"<cache-config><icache sets="64" ways="4" policy="LRU" write-policy="write-back" /></cache-config>"#;
        assert!(parse(xml).is_err());
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let xml = r#"<cache-config><icache sets="64" ways="4" block-size="32" policy="bogus" write-policy="write-back" /></cache-config>"#;
        assert!(parse(xml).is_err());
    }

    #[test]
    fn miss_penalty_defaults_to_zero_and_is_otherwise_parsed() {
        let xml = r#"<cache-config>
            <icache sets="64" ways="4" block-size="32" policy="LRU" write-policy="write-back" />
            <dcache sets="64" ways="4" block-size="32" policy="LRU" write-policy="write-back" miss-penalty="10" />
        </cache-config>"#;
        let platform = parse(xml).unwrap();
        assert_eq!(platform.icache[0].miss_penalty, 0);
        assert_eq!(platform.dcache[0].miss_penalty, 10);
    }
}
