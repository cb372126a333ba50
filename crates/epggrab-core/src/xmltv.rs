//! XMLTV rendering.

use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{info, instrument};

use crate::channels::ChannelMap;
use crate::logos::LogoCache;
use crate::model::Program;
use crate::store::ProgramStore;

/// Generator name written to the `<tv>` root.
const GENERATOR: &str = concat!("epggrab ", env!("CARGO_PKG_VERSION"));

/// Document-level rendering settings.
#[derive(Debug, Clone, Copy)]
pub struct GuideOptions<'a> {
    /// Feed server URL (`source-info-url`).
    pub source_url: &'a str,
    /// Feed server name (`source-info-name`).
    pub source_name: &'a str,
    /// `lang` attribute of text elements.
    pub language: &'a str,
    /// Display names.
    pub channels: &'a ChannelMap,
    /// Resolved channel logos.
    pub logos: Option<&'a LogoCache>,
}

type XmlWriter = Writer<Vec<u8>>;

/// Renders `store` as an XMLTV document.
///
/// Channels come first sorted by id, then every programme sorted by
/// channel id and program id.
///
/// # Errors
///
/// Returns an error if writing to the buffer fails.
pub fn render_guide(store: &ProgramStore, options: &GuideOptions<'_>) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("failed to write XML declaration")?;
    let root = BytesStart::new("tv").with_attributes([
        ("source-info-url", options.source_url),
        ("source-info-name", options.source_name),
        ("generator-info-name", GENERATOR),
    ]);
    writer
        .write_event(Event::Start(root))
        .context("failed to write <tv>")?;

    for channel in store.channel_ids() {
        write_channel(&mut writer, channel, options)
            .with_context(|| format!("failed to write channel {channel}"))?;
    }
    for program in store.programs() {
        write_programme(&mut writer, program, options.language).with_context(|| {
            format!("failed to write programme {}/{}", program.channel, program.id)
        })?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("tv")))
        .context("failed to write </tv>")?;

    let mut xml = writer.into_inner();
    xml.push(b'\n');
    Ok(xml)
}

/// Renders `store` and writes it to `path`.
///
/// # Errors
///
/// Returns an error if rendering or writing the file fails.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_guide(path: &Path, store: &ProgramStore, options: &GuideOptions<'_>) -> Result<()> {
    let xml = render_guide(store, options)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, &xml).with_context(|| format!("failed to write {}", path.display()))?;
    info!(
        channels = store.channel_count(),
        programmes = store.program_count(),
        bytes = xml.len(),
        "wrote XMLTV guide"
    );
    Ok(())
}

fn write_channel(writer: &mut XmlWriter, channel: &str, options: &GuideOptions<'_>) -> Result<()> {
    writer.write_event(Event::Start(
        BytesStart::new("channel").with_attributes([("id", channel)]),
    ))?;
    text_element(
        writer,
        "display-name",
        &[("lang", options.language)],
        options.channels.display_name(channel),
    )?;
    if let Some(logo) = options.logos.and_then(|logos| logos.get(channel)) {
        let src = format!("file://{}", logo.display());
        writer.write_event(Event::Empty(
            BytesStart::new("icon").with_attributes([("src", src.as_str())]),
        ))?;
    }
    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    Ok(())
}

fn write_programme(writer: &mut XmlWriter, program: &Program, language: &str) -> Result<()> {
    let start = program.start.to_string();
    let stop = program.stop.to_string();
    writer.write_event(Event::Start(BytesStart::new("programme").with_attributes([
        ("start", start.as_str()),
        ("stop", stop.as_str()),
        ("channel", program.channel.as_str()),
    ])))?;

    let lang = [("lang", language)];
    text_element(writer, "title", &lang, &program.title)?;
    if let Some(subtitle) = &program.subtitle {
        text_element(writer, "sub-title", &lang, subtitle)?;
    }
    if let Some(description) = &program.description {
        text_element(writer, "desc", &lang, description)?;
    }
    if let Some(credits) = &program.credits {
        writer.write_event(Event::Start(BytesStart::new("credits")))?;
        for (role, names) in credits {
            for name in names {
                text_element(writer, role.as_str(), &[], name)?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("credits")))?;
    }
    for category in program.categories.iter().flatten() {
        text_element(writer, "category", &lang, category)?;
    }
    if let Some(aspect) = &program.aspect_ratio {
        writer.write_event(Event::Start(BytesStart::new("video")))?;
        text_element(writer, "aspect", &[], aspect)?;
        writer.write_event(Event::End(BytesEnd::new("video")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("programme")))?;
    Ok(())
}

fn text_element(
    writer: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    writer.write_event(Event::Start(
        BytesStart::new(name).with_attributes(attributes.iter().copied()),
    ))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
