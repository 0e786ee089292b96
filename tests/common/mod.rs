// ABOUTME: Shared fixtures for deckmark integration tests
// ABOUTME: Builds a small synthetic .pptx template, PNG images and project directories

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const REL_LAYOUT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
const REL_MASTER: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";

fn rels(entries: &[(&str, &str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, ty, target)| format!(r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#, id, ty, target))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        body
    )
}

/// A placeholder shape; `xfrm` is (x, y, cx, cy) in EMU.
fn ph_shape(id: u32, name: &str, ph: &str, xfrm: Option<(i64, i64, i64, i64)>) -> String {
    let sp_pr = match xfrm {
        Some((x, y, cx, cy)) => format!(
            r#"<p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm></p:spPr>"#,
            x, y, cx, cy
        ),
        None => "<p:spPr/>".to_string(),
    };
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr>{}</p:nvPr></p:nvSpPr>{}</p:sp>"#,
        id, name, ph, sp_pr
    )
}

fn layout_xml(name: &str, shapes: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout {}><p:cSld name="{}"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        NS,
        name,
        shapes.concat()
    )
}

/// Parts of the fixture template.
///
/// Layouts: "Title" (ctrTitle + subTitle, geometry from the master), "Text"
/// (title + body idx 1), "Picture" (title, pic idx 1 and 2, body idx 3) and
/// "Blank" (a footer only, registered with an empty inventory). The template
/// carries one existing slide.
pub fn template_parts() -> Vec<(String, String)> {
    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/slideLayouts/slideLayout2.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/slideLayouts/slideLayout3.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/slideLayouts/slideLayout4.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/></Types>"#;

    let presentation = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        NS
    );

    let master = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}{}</p:spTree></p:cSld><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/><p:sldLayoutId id="2147483650" r:id="rId2"/><p:sldLayoutId id="2147483651" r:id="rId3"/><p:sldLayoutId id="2147483652" r:id="rId4"/></p:sldLayoutIdLst></p:sldMaster>"#,
        NS,
        ph_shape(2, "Title Placeholder 1", r#"<p:ph type="title"/>"#, Some((838200, 365125, 10515600, 1325563))),
        ph_shape(3, "Text Placeholder 2", r#"<p:ph type="body" idx="1"/>"#, Some((838200, 1825625, 10515600, 4351338))),
    );

    let title_layout = layout_xml(
        "Title",
        &[
            ph_shape(2, "Title 1", r#"<p:ph type="ctrTitle"/>"#, None),
            ph_shape(3, "Subtitle 2", r#"<p:ph type="subTitle" idx="1"/>"#, None),
            ph_shape(4, "Date Placeholder 3", r#"<p:ph type="dt" sz="half" idx="10"/>"#, None),
        ],
    );
    let text_layout = layout_xml(
        "Text",
        &[
            ph_shape(2, "Title 1", r#"<p:ph type="title"/>"#, None),
            ph_shape(3, "Content Placeholder 2", r#"<p:ph idx="1"/>"#, Some((838200, 1825625, 10515600, 4351338))),
            ph_shape(4, "Slide Number Placeholder 3", r#"<p:ph type="sldNum" sz="quarter" idx="12"/>"#, None),
        ],
    );
    let picture_layout = layout_xml(
        "Picture",
        &[
            ph_shape(2, "Title 1", r#"<p:ph type="title"/>"#, None),
            ph_shape(3, "Picture Placeholder 2", r#"<p:ph type="pic" idx="1"/>"#, Some((914400, 1828800, 4572000, 2743200))),
            ph_shape(4, "Picture Placeholder 3", r#"<p:ph type="pic" idx="2"/>"#, Some((6400800, 1828800, 4572000, 2743200))),
            ph_shape(5, "Text Placeholder 4", r#"<p:ph type="body" sz="quarter" idx="3"/>"#, Some((914400, 5486400, 10058400, 914400))),
        ],
    );
    let blank_layout = layout_xml(
        "Blank",
        &[ph_shape(2, "Footer Placeholder 1", r#"<p:ph type="ftr" sz="quarter" idx="11"/>"#, None)],
    );

    let old_slide = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
        NS,
        ph_shape(2, "Title 1", r#"<p:ph type="title"/>"#, None)
    );

    let layout_rels = rels(&[("rId1", REL_MASTER, "../slideMasters/slideMaster1.xml")]);

    vec![
        ("[Content_Types].xml".into(), content_types.to_string()),
        (
            "_rels/.rels".into(),
            rels(&[(
                "rId1",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument",
                "ppt/presentation.xml",
            )]),
        ),
        ("ppt/presentation.xml".into(), presentation),
        (
            "ppt/_rels/presentation.xml.rels".into(),
            rels(&[
                ("rId1", REL_MASTER, "slideMasters/slideMaster1.xml"),
                (
                    "rId2",
                    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide",
                    "slides/slide1.xml",
                ),
            ]),
        ),
        ("ppt/slideMasters/slideMaster1.xml".into(), master),
        (
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".into(),
            rels(&[
                ("rId1", REL_LAYOUT, "../slideLayouts/slideLayout1.xml"),
                ("rId2", REL_LAYOUT, "../slideLayouts/slideLayout2.xml"),
                ("rId3", REL_LAYOUT, "../slideLayouts/slideLayout3.xml"),
                ("rId4", REL_LAYOUT, "../slideLayouts/slideLayout4.xml"),
            ]),
        ),
        ("ppt/slideLayouts/slideLayout1.xml".into(), title_layout),
        ("ppt/slideLayouts/slideLayout2.xml".into(), text_layout),
        ("ppt/slideLayouts/slideLayout3.xml".into(), picture_layout),
        ("ppt/slideLayouts/slideLayout4.xml".into(), blank_layout),
        ("ppt/slideLayouts/_rels/slideLayout1.xml.rels".into(), layout_rels.clone()),
        ("ppt/slideLayouts/_rels/slideLayout2.xml.rels".into(), layout_rels.clone()),
        ("ppt/slideLayouts/_rels/slideLayout3.xml.rels".into(), layout_rels.clone()),
        ("ppt/slideLayouts/_rels/slideLayout4.xml.rels".into(), layout_rels),
        ("ppt/slides/slide1.xml".into(), old_slide),
        (
            "ppt/slides/_rels/slide1.xml.rels".into(),
            rels(&[("rId1", REL_LAYOUT, "../slideLayouts/slideLayout1.xml")]),
        ),
    ]
}

/// Write the fixture template to `path`.
pub fn write_template(path: &Path) {
    let file = fs::File::create(path).expect("Failed to create template file");
    let mut zip = ZipWriter::new(file);
    for (name, xml) in template_parts() {
        zip.start_file(name, FileOptions::default()).expect("Failed to start part");
        zip.write_all(xml.as_bytes()).expect("Failed to write part");
    }
    zip.finish().expect("Failed to finish template");
}

/// Write a solid-color PNG of the given size.
pub fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 120, 200]));
    img.save(path).expect("Failed to write PNG");
}

/// Lay out a project directory with a config, template and content file.
/// Returns the config path.
pub fn write_project(dir: &Path, content: &str, extra_config: &str) -> PathBuf {
    write_template(&dir.join("template.pptx"));
    fs::write(dir.join("deck.md"), content).expect("Failed to write content");
    let config = format!(
        "paths:\n  template: template.pptx\n  content: deck.md\n  output: out/deck.pptx\n{}",
        extra_config
    );
    let config_path = dir.join("config.yaml");
    fs::write(&config_path, config).expect("Failed to write config");
    config_path
}

pub fn part_names(pptx: &Path) -> Vec<String> {
    let file = fs::File::open(pptx).expect("Failed to open pptx");
    let archive = ZipArchive::new(file).expect("Invalid zip");
    archive.file_names().map(str::to_string).collect()
}

pub fn read_part(pptx: &Path, name: &str) -> String {
    let file = fs::File::open(pptx).expect("Failed to open pptx");
    let mut archive = ZipArchive::new(file).expect("Invalid zip");
    let mut part = archive.by_name(name).unwrap_or_else(|_| panic!("Missing part {}", name));
    let mut text = String::new();
    part.read_to_string(&mut text).expect("Part is not UTF-8");
    text
}
