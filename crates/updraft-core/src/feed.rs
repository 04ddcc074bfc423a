//! Appcast feed parser.
//!
//! Converts raw appcast XML into an [`Appcast`]. The contract is lossy and
//! tolerant: a document that cannot be parsed at all (malformed XML, wrong
//! root structure) yields an *empty* feed rather than an error, an item
//! that violates the item rules is dropped without affecting its siblings,
//! and an enclosure with an unrecognized attribute invalidates only that
//! enclosure. One bad item must never abort parsing of the rest of the
//! feed.
//!
//! Element and attribute names are matched case-insensitively, namespace
//! prefix included (`sparkle:version` is matched as written, not resolved).

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;
use updraft_schema::{Appcast, Enclosure, LangKey, ReleaseItem, SignatureAlgorithm, Version};

/// Internal bail-out marker: the document is not well-formed XML.
///
/// Deliberately carries no detail; the public contract folds every
/// structural failure into an empty feed.
struct Unwind;

type ParseResult<T> = Result<T, Unwind>;

/// Parse an appcast document.
///
/// Never fails: structurally unparseable input or a document without an
/// `rss`/`channel` skeleton produces a feed with zero items.
pub fn parse_appcast(xml: &str) -> Appcast {
    parse_document(xml).unwrap_or_else(|Unwind| {
        debug!("appcast XML is not well-formed, treating as empty feed");
        Appcast::default()
    })
}

fn parse_document(xml: &str) -> ParseResult<Appcast> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut appcast = Appcast::default();
    loop {
        match read(&mut reader)? {
            Event::Start(root) if name_is(&root, b"rss") => {
                parse_rss(&mut reader, &mut appcast)?;
            }
            Event::Start(_) => {
                // wrong root element: not an appcast
                skip_subtree(&mut reader)?;
            }
            Event::Eof => return Ok(appcast),
            _ => {}
        }
    }
}

/// Walk the children of `rss`, parsing the first `channel` found.
fn parse_rss(reader: &mut Reader<&[u8]>, appcast: &mut Appcast) -> ParseResult<()> {
    loop {
        match read(reader)? {
            Event::Start(child) if name_is(&child, b"channel") => {
                parse_channel(reader, appcast)?;
            }
            Event::Start(_) => {
                skip_subtree(reader)?;
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(Unwind),
            _ => {}
        }
    }
}

fn parse_channel(reader: &mut Reader<&[u8]>, appcast: &mut Appcast) -> ParseResult<()> {
    loop {
        let event = read(reader)?;
        match event {
            Event::Start(ref child) | Event::Empty(ref child) => {
                let empty = matches!(event, Event::Empty(_));
                if name_is(child, b"item") {
                    if empty {
                        debug!("dropping empty feed item");
                    } else {
                        match parse_item(reader)? {
                            Some(item) => appcast.items.push(item),
                            None => debug!("dropping malformed feed item"),
                        }
                    }
                } else if name_is(child, b"title") {
                    appcast.title = element_text(reader, empty)?;
                } else if name_is(child, b"link") {
                    appcast.info_link = element_text(reader, empty)?;
                } else if name_is(child, b"description") {
                    appcast.description = element_text(reader, empty)?;
                } else if name_is(child, b"language") {
                    appcast.language = element_text(reader, empty)?;
                } else if !empty {
                    // unrecognized channel children are skipped, not fatal
                    skip_subtree(reader)?;
                }
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(Unwind),
            _ => {}
        }
    }
}

/// Parse one `item` subtree.
///
/// Always consumes the whole subtree. Returns `None` when the item violates
/// the item rules: an unrecognized child element, an empty localized text,
/// stray text content, or a failed [`ReleaseItem::validate`].
fn parse_item(reader: &mut Reader<&[u8]>) -> ParseResult<Option<ReleaseItem>> {
    let mut item = ReleaseItem::default();
    let mut valid = true;

    loop {
        let event = read(reader)?;
        match event {
            Event::Start(ref child) | Event::Empty(ref child) => {
                let empty = matches!(event, Event::Empty(_));
                if name_is(child, b"title") {
                    item.title = element_text(reader, empty)?;
                } else if name_is(child, b"pubDate") {
                    item.publish_date = element_text(reader, empty)?;
                } else if name_is(child, b"link") {
                    item.info_link = element_text(reader, empty)?;
                } else if name_is(child, b"description") {
                    valid &= localized_entry(reader, child, empty, &mut item.description)?;
                } else if name_is(child, b"sparkle:releaseNotesLink") {
                    valid &= localized_entry(reader, child, empty, &mut item.release_notes_link)?;
                } else if name_is(child, b"sparkle:version") {
                    item.version = Version::from(element_text(reader, empty)?);
                } else if name_is(child, b"sparkle:shortVersionString") {
                    item.short_version = element_text(reader, empty)?;
                } else if name_is(child, b"sparkle:channel") {
                    item.channel = element_text(reader, empty)?;
                } else if name_is(child, b"sparkle:minimumSystemVersion") {
                    item.min_system_version = element_text(reader, empty)?;
                } else if name_is(child, b"sparkle:minimumAutoupdateVersion") {
                    item.min_auto_update_version = element_text(reader, empty)?;
                } else if name_is(child, b"sparkle:criticalUpdate") {
                    // the barrier rides on an attribute; absent is still valid
                    if let Some(barrier) = find_attr(child, b"sparkle:version")? {
                        item.critical_update_barrier = barrier;
                    }
                    if !empty {
                        skip_subtree(reader)?;
                    }
                } else if name_is(child, b"sparkle:informationalUpdate") {
                    if empty {
                        item.informational_versions = Vec::new();
                    } else {
                        match parse_informational(reader)? {
                            Some(versions) => item.informational_versions = versions,
                            None => valid = false,
                        }
                    }
                } else if name_is(child, b"sparkle:phasedRolloutInterval") {
                    let text = element_text(reader, empty)?;
                    item.phased_rollout_interval = text.trim().parse().unwrap_or(0);
                } else if name_is(child, b"enclosure") {
                    if let Some(enclosure) = parse_enclosure(child)? {
                        item.enclosures.push(enclosure);
                    } else {
                        debug!("dropping malformed enclosure");
                    }
                    if !empty {
                        skip_subtree(reader)?;
                    }
                } else {
                    // unrecognized child: the item is rejected, but its
                    // subtree must still be consumed so siblings parse
                    valid = false;
                    if !empty {
                        skip_subtree(reader)?;
                    }
                }
            }
            Event::Text(_) | Event::CData(_) => {
                // stray text directly inside <item>
                valid = false;
            }
            Event::End(_) => break,
            Event::Eof => return Err(Unwind),
            _ => {}
        }
    }

    if valid && item.validate().is_ok() {
        Ok(Some(item))
    } else {
        Ok(None)
    }
}

/// Parse a `sparkle:informationalUpdate` subtree: a list of
/// `sparkle:version` children. Any other child (or stray text) makes the
/// whole item invalid; `None` signals that while still consuming the
/// subtree.
fn parse_informational(reader: &mut Reader<&[u8]>) -> ParseResult<Option<Vec<String>>> {
    let mut versions = Vec::new();
    let mut valid = true;
    loop {
        let event = read(reader)?;
        match event {
            Event::Start(ref child) | Event::Empty(ref child) => {
                let empty = matches!(event, Event::Empty(_));
                if name_is(child, b"sparkle:version") {
                    versions.push(element_text(reader, empty)?);
                } else {
                    valid = false;
                    if !empty {
                        skip_subtree(reader)?;
                    }
                }
            }
            Event::Text(_) | Event::CData(_) => valid = false,
            Event::End(_) => break,
            Event::Eof => return Err(Unwind),
            _ => {}
        }
    }
    Ok(valid.then_some(versions))
}

/// Resolve the attributes of an `enclosure` element.
///
/// Accepts only the known attribute vocabulary; an unrecognized attribute
/// or a failed [`Enclosure::validate`] rejects this enclosure (and only
/// this enclosure).
fn parse_enclosure(element: &BytesStart<'_>) -> ParseResult<Option<Enclosure>> {
    let mut enclosure = Enclosure::default();
    let mut known = true;

    for attr in element.attributes() {
        let attr = attr.map_err(|_| Unwind)?;
        let name = attr.key.as_ref();
        let value = attr.unescape_value().map_err(|_| Unwind)?.into_owned();
        if name.eq_ignore_ascii_case(b"url") {
            enclosure.url = value;
        } else if name.eq_ignore_ascii_case(b"sparkle:edSignature") {
            enclosure.signature_algorithm = SignatureAlgorithm::Ed25519;
            enclosure.signature = value;
        } else if name.eq_ignore_ascii_case(b"sparkle:dsaSignature") {
            enclosure.signature_algorithm = SignatureAlgorithm::Dsa;
            enclosure.signature = value;
        } else if name.eq_ignore_ascii_case(b"length") {
            enclosure.size = value.trim().parse().unwrap_or(0);
        } else if name.eq_ignore_ascii_case(b"type") {
            enclosure.mime_type = value;
        } else if name.eq_ignore_ascii_case(b"sparkle:os") {
            enclosure.target_os = value;
        } else if name.eq_ignore_ascii_case(b"sparkle:installerArguments") {
            enclosure.install_arguments = value;
        } else {
            known = false;
        }
    }

    Ok((known && enclosure.validate().is_ok()).then_some(enclosure))
}

/// Read one localized element (`description`, `sparkle:releaseNotesLink`)
/// into `map`. Returns `false` when the entry makes the item invalid: a
/// malformed `xml:lang` attribute or empty text.
fn localized_entry(
    reader: &mut Reader<&[u8]>,
    element: &BytesStart<'_>,
    empty: bool,
    map: &mut updraft_schema::LocalizedText,
) -> ParseResult<bool> {
    let key = match find_attr(element, b"xml:lang")? {
        Some(tag) => match LangKey::from_tag(&tag) {
            Some(key) => key,
            // a language attribute that is not two letters
            None => {
                if !empty {
                    skip_subtree(reader)?;
                }
                return Ok(false);
            }
        },
        None => LangKey::Unspecified,
    };

    let text = element_text(reader, empty)?;
    if text.is_empty() {
        return Ok(false);
    }
    map.insert(key, text);
    Ok(true)
}

/// Case-insensitive lookup of an attribute by qualified name.
fn find_attr(element: &BytesStart<'_>, name: &[u8]) -> ParseResult<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|_| Unwind)?;
        if attr.key.as_ref().eq_ignore_ascii_case(name) {
            let value = attr.unescape_value().map_err(|_| Unwind)?.into_owned();
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Collect the direct text content of the element just opened.
///
/// Nested markup is skipped wholesale; text inside nested elements does not
/// contribute. For a self-closed element (`empty`) the text is "".
fn element_text(reader: &mut Reader<&[u8]>, empty: bool) -> ParseResult<String> {
    if empty {
        return Ok(String::new());
    }
    let mut text = String::new();
    loop {
        match read(reader)? {
            Event::Text(content) => {
                let decoded = content.decode().map_err(|_| Unwind)?;
                let unescaped = quick_xml::escape::unescape(&decoded).map_err(|_| Unwind)?;
                text.push_str(&unescaped);
            }
            Event::CData(content) => {
                let raw = String::from_utf8_lossy(content.as_ref()).into_owned();
                text.push_str(&raw);
            }
            Event::Start(_) => {
                skip_subtree(reader)?;
            }
            Event::End(_) => return Ok(text.trim().to_string()),
            Event::Eof => return Err(Unwind),
            _ => {}
        }
    }
}

/// Consume events until the end tag matching an already-consumed start tag.
fn skip_subtree(reader: &mut Reader<&[u8]>) -> ParseResult<()> {
    let mut depth = 0usize;
    loop {
        match read(reader)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Event::Eof => return Err(Unwind),
            _ => {}
        }
    }
}

fn name_is(element: &BytesStart<'_>, expected: &[u8]) -> bool {
    element.name().as_ref().eq_ignore_ascii_case(expected)
}

fn read<'a>(reader: &mut Reader<&'a [u8]>) -> ParseResult<Event<'a>> {
    reader.read_event().map_err(|_| Unwind)
}
