//! 3MF (3D Manufacturing Format) support.
//!
//! A 3MF file is a ZIP archive holding `3D/3dmodel.model` (XML geometry),
//! `[Content_Types].xml` and `_rels/.rels`. Every object's mesh is read and
//! concatenated; build item transforms are ignored on import. On export each
//! object becomes its own build item, model-level `<metadata>` entries carry
//! assembly information, and extra files (such as `Metadata/assembly.json`)
//! can be stored alongside the model.

use crate::float_types::Real;
use crate::io::{IoError, IoResult, open};
use crate::mesh::Mesh;
use nalgebra::Point3;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const NAMESPACE_3MF: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// Content types for the model, relationships and JSON side files.
const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
  <Default Extension="json" ContentType="application/json"/>
</Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// One object of a 3MF model.
#[derive(Debug, Clone, Copy)]
pub struct ModelObject<'a> {
    pub name: &'a str,
    pub mesh: &'a Mesh,
}

/// Everything written into one 3MF archive.
#[derive(Debug, Clone, Default)]
pub struct ModelDocument<'a> {
    pub objects: Vec<ModelObject<'a>>,
    /// Model-level `<metadata name="…">value</metadata>` entries.
    pub metadata: Vec<(String, String)>,
    /// Additional archive entries, path → contents.
    pub attachments: Vec<(String, Vec<u8>)>,
}

/// Read every mesh object of a 3MF file into one solid.
pub fn read_3mf(path: &Path) -> IoResult<Mesh> {
    let reader = BufReader::new(open(path)?);
    let mut archive = ZipArchive::new(reader)?;
    let model = read_model_file(&mut archive)?;
    let (positions, faces) = parse_model(&model)?;
    Mesh::from_triangles(&positions, &faces)
}

/// Read one named entry of a 3MF archive, e.g. `Metadata/assembly.json`.
pub fn read_attachment(path: &Path, entry: &str) -> IoResult<Vec<u8>> {
    let mut archive = ZipArchive::new(BufReader::new(open(path)?))?;
    let mut file = archive.by_name(entry)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Model-level metadata of a 3MF file, in document order.
pub fn read_metadata(path: &Path) -> IoResult<Vec<(String, String)>> {
    let mut archive = ZipArchive::new(BufReader::new(open(path)?))?;
    let model = read_model_file(&mut archive)?;

    let mut reader = Reader::from_str(&model);
    reader.config_mut().trim_text(true);
    let mut entries = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"metadata" => {
                current = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == b"name")
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
            },
            Event::Text(text) => {
                if let Some(name) = current.take() {
                    let value = text
                        .unescape()
                        .map_err(|e| IoError::invalid_content(format!("invalid metadata text: {e}")))?;
                    entries.push((name, value.into_owned()));
                }
            },
            Event::End(e) if e.local_name().as_ref() == b"metadata" => current = None,
            Event::Eof => break,
            _ => {},
        }
    }
    Ok(entries)
}

fn read_model_file<R: Read + Seek>(archive: &mut ZipArchive<R>) -> IoResult<String> {
    for name in ["3D/3dmodel.model", "3d/3dmodel.model", "3D/3DModel.model"] {
        if let Ok(mut file) = archive.by_name(name) {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            return Ok(content);
        }
    }

    let model_entry = archive
        .file_names()
        .find(|name| name.to_ascii_lowercase().ends_with(".model"))
        .map(str::to_string);
    match model_entry {
        Some(name) => {
            let mut content = String::new();
            archive.by_name(&name)?.read_to_string(&mut content)?;
            Ok(content)
        },
        None => Err(IoError::invalid_content("3MF archive does not contain a model file")),
    }
}

fn attribute<T: std::str::FromStr>(element: &BytesStart<'_>, key: &[u8]) -> IoResult<T>
where
    IoError: From<T::Err>,
{
    let attr = element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .ok_or_else(|| {
            IoError::invalid_content(format!(
                "<{}> lacks attribute {}",
                String::from_utf8_lossy(element.local_name().as_ref()),
                String::from_utf8_lossy(key)
            ))
        })?;
    let text = std::str::from_utf8(&attr.value)
        .map_err(|e| IoError::invalid_content(format!("invalid UTF-8 in attribute: {e}")))?;
    Ok(text.trim().parse::<T>()?)
}

type Triangles = (Vec<Point3<Real>>, Vec<[usize; 3]>);

fn parse_model(content: &str) -> IoResult<Triangles> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut positions = Vec::new();
    let mut faces = Vec::new();
    let mut offset = 0;
    let (mut in_vertices, mut in_triangles) = (false, false);

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"mesh" => offset = positions.len(),
                b"vertices" => in_vertices = true,
                b"triangles" => in_triangles = true,
                b"vertex" if in_vertices => positions.push(Point3::new(
                    attribute::<Real>(e, b"x")?,
                    attribute::<Real>(e, b"y")?,
                    attribute::<Real>(e, b"z")?,
                )),
                b"triangle" if in_triangles => faces.push([
                    offset + attribute::<usize>(e, b"v1")?,
                    offset + attribute::<usize>(e, b"v2")?,
                    offset + attribute::<usize>(e, b"v3")?,
                ]),
                _ => {},
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"vertices" => in_vertices = false,
                b"triangles" => in_triangles = false,
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }
    Ok((positions, faces))
}

fn xml_error<E: std::fmt::Display>(what: &str) -> impl Fn(E) -> IoError + '_ {
    move |e| IoError::invalid_content(format!("failed to write {what}: {e}"))
}

fn generate_model_xml(document: &ModelDocument<'_>) -> IoResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error("XML declaration"))?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("xmlns", NAMESPACE_3MF));
    model.push_attribute(("unit", "millimeter"));
    model.push_attribute(("xml:lang", "en-US"));
    writer.write_event(Event::Start(model)).map_err(xml_error("model element"))?;

    for (name, value) in &document.metadata {
        let mut entry = BytesStart::new("metadata");
        entry.push_attribute(("name", name.as_str()));
        writer.write_event(Event::Start(entry)).map_err(xml_error("metadata"))?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(xml_error("metadata value"))?;
        writer
            .write_event(Event::End(BytesEnd::new("metadata")))
            .map_err(xml_error("metadata"))?;
    }

    writer
        .write_event(Event::Start(BytesStart::new("resources")))
        .map_err(xml_error("resources element"))?;
    for (i, object) in document.objects.iter().enumerate() {
        write_object(&mut writer, i + 1, object)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("resources")))
        .map_err(xml_error("resources element"))?;

    writer
        .write_event(Event::Start(BytesStart::new("build")))
        .map_err(xml_error("build element"))?;
    for i in 0..document.objects.len() {
        let mut item = BytesStart::new("item");
        item.push_attribute(("objectid", (i + 1).to_string().as_str()));
        writer.write_event(Event::Empty(item)).map_err(xml_error("build item"))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("build")))
        .map_err(xml_error("build element"))?;

    writer
        .write_event(Event::End(BytesEnd::new("model")))
        .map_err(xml_error("model element"))?;
    Ok(buffer)
}

fn write_object<W: Write>(writer: &mut Writer<W>, id: usize, object: &ModelObject<'_>) -> IoResult<()> {
    let indexed = object.mesh.to_indexed();

    let mut element = BytesStart::new("object");
    element.push_attribute(("id", id.to_string().as_str()));
    element.push_attribute(("name", object.name));
    element.push_attribute(("type", "model"));
    writer.write_event(Event::Start(element)).map_err(xml_error("object element"))?;
    writer
        .write_event(Event::Start(BytesStart::new("mesh")))
        .map_err(xml_error("mesh element"))?;

    writer
        .write_event(Event::Start(BytesStart::new("vertices")))
        .map_err(xml_error("vertices element"))?;
    for p in &indexed.positions {
        let mut vertex = BytesStart::new("vertex");
        vertex.push_attribute(("x", format!("{:.6}", p.x).as_str()));
        vertex.push_attribute(("y", format!("{:.6}", p.y).as_str()));
        vertex.push_attribute(("z", format!("{:.6}", p.z).as_str()));
        writer.write_event(Event::Empty(vertex)).map_err(xml_error("vertex"))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("vertices")))
        .map_err(xml_error("vertices element"))?;

    writer
        .write_event(Event::Start(BytesStart::new("triangles")))
        .map_err(xml_error("triangles element"))?;
    for &[v1, v2, v3] in &indexed.faces {
        let mut triangle = BytesStart::new("triangle");
        triangle.push_attribute(("v1", v1.to_string().as_str()));
        triangle.push_attribute(("v2", v2.to_string().as_str()));
        triangle.push_attribute(("v3", v3.to_string().as_str()));
        writer.write_event(Event::Empty(triangle)).map_err(xml_error("triangle"))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("triangles")))
        .map_err(xml_error("triangles element"))?;

    writer
        .write_event(Event::End(BytesEnd::new("mesh")))
        .map_err(xml_error("mesh element"))?;
    writer
        .write_event(Event::End(BytesEnd::new("object")))
        .map_err(xml_error("object element"))?;
    Ok(())
}

/// Write `document` as a 3MF archive at `path`.
pub fn write_3mf(path: &Path, document: &ModelDocument<'_>) -> IoResult<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(RELS_XML.as_bytes())?;
    zip.start_file("3D/3dmodel.model", options)?;
    zip.write_all(&generate_model_xml(document)?)?;
    for (name, contents) in &document.attachments {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(contents)?;
    }
    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::polygon::FaceTag;
    use crate::traits::CSGOps;
    use approx::assert_relative_eq;

    #[test]
    fn objects_and_metadata_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.3mf");
        let a = Mesh::cube(10.0, FaceTag::Surface);
        let b = Mesh::cube(10.0, FaceTag::Surface).translate(20.0, 0.0, 0.0);
        let document = ModelDocument {
            objects: vec![
                ModelObject { name: "a", mesh: &a },
                ModelObject { name: "b & c", mesh: &b },
            ],
            metadata: vec![("meshcut:part_index".to_string(), "1 < 2".to_string())],
            attachments: vec![("Metadata/notes.json".to_string(), b"{}".to_vec())],
        };
        write_3mf(&path, &document).unwrap();

        let loaded = read_3mf(&path).unwrap();
        assert_eq!(loaded.triangle_count(), 24);
        assert_relative_eq!(loaded.volume(), 2000.0, epsilon = 1e-3);
        assert_eq!(
            read_metadata(&path).unwrap(),
            vec![("meshcut:part_index".to_string(), "1 < 2".to_string())]
        );
        assert_eq!(read_attachment(&path, "Metadata/notes.json").unwrap(), b"{}");
    }

    #[test]
    fn archive_without_model_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.3mf");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        zip.finish().unwrap();
        assert!(matches!(read_3mf(&path), Err(IoError::InvalidContent { .. })));
    }
}
