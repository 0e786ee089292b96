// ABOUTME: PresentationML serialization of built slides
// ABOUTME: Renders text, picture and caption shapes as slide XML with their relationships

use crate::builder::{Bullet, Paragraph, PictureShape, Slide, SlideShape, TextShape};
use crate::errors::Result;
use crate::images::CaptionBox;
use crate::layouts::{Frame, PlaceholderDescriptor};
use crate::pptx::{Relationship, REL_HYPERLINK, REL_IMAGE, REL_SLIDE_LAYOUT};
use crate::rich_text::StyledRun;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::path::Path;

const MONOSPACE_FONT: &str = "Courier New";

/// Serialized slide part and its relationships.
#[derive(Debug, Clone)]
pub struct RenderedSlide {
    pub xml: String,
    pub relationships: Vec<Relationship>,
}

/// Renders one slide. `embed_image` stores an image file in the package and
/// returns its target relative to the slide part.
pub fn render_slide(
    slide: &Slide,
    layout_target: &str,
    embed_image: &mut dyn FnMut(&Path) -> Result<String>,
) -> Result<RenderedSlide> {
    let mut writer = SlideWriter {
        relationships: vec![Relationship::internal("rId1", REL_SLIDE_LAYOUT, layout_target)],
        next_shape_id: 2,
        body: String::new(),
    };

    for shape in &slide.shapes {
        match shape {
            SlideShape::Text(text) => writer.text_shape(text),
            SlideShape::Picture(picture) => {
                let target = embed_image(&picture.placement.path)?;
                writer.picture(picture, &target)?;
            }
            SlideShape::Caption(caption) => writer.caption(caption)?,
        }
    }

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
    <p:cSld>
        <p:spTree>
            <p:nvGrpSpPr>
                <p:cNvPr id="1" name=""/>
                <p:cNvGrpSpPr/>
                <p:nvPr/>
            </p:nvGrpSpPr>
            <p:grpSpPr>
                <a:xfrm>
                    <a:off x="0" y="0"/>
                    <a:ext cx="0" cy="0"/>
                    <a:chOff x="0" y="0"/>
                    <a:chExt cx="0" cy="0"/>
                </a:xfrm>
            </p:grpSpPr>
{shapes}        </p:spTree>
    </p:cSld>
    <p:clrMapOvr>
        <a:masterClrMapping/>
    </p:clrMapOvr>
</p:sld>"#,
        shapes = writer.body
    );

    Ok(RenderedSlide {
        xml,
        relationships: writer.relationships,
    })
}

struct SlideWriter {
    relationships: Vec<Relationship>,
    next_shape_id: u32,
    body: String,
}

fn placeholder_element(placeholder: &PlaceholderDescriptor) -> String {
    let mut ph = String::from("<p:ph");
    if let Some(ph_type) = &placeholder.ph_type {
        let _ = write!(ph, r#" type="{}""#, escape(ph_type.as_str()));
    }
    if placeholder.index != 0 {
        let _ = write!(ph, r#" idx="{}""#, placeholder.index);
    }
    ph.push_str("/>");
    ph
}

fn xfrm(frame: &Frame) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        frame.x, frame.y, frame.cx, frame.cy
    )
}

fn points(pt: f64) -> i64 {
    (pt * 100.0).round() as i64
}

fn solid_fill(rgb: &str) -> String {
    format!(r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, rgb)
}

impl SlideWriter {
    fn shape_id(&mut self) -> u32 {
        let id = self.next_shape_id;
        self.next_shape_id += 1;
        id
    }

    fn add_relationship(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let id = format!("rId{}", self.relationships.len() + 1);
        let rel = if external {
            Relationship::external(&id, rel_type, target)
        } else {
            Relationship::internal(&id, rel_type, target)
        };
        self.relationships.push(rel);
        id
    }

    fn text_shape(&mut self, shape: &TextShape) {
        let id = self.shape_id();
        let mut paragraphs = String::new();
        for paragraph in &shape.paragraphs {
            let xml = self.paragraph(paragraph);
            paragraphs.push_str(&xml);
        }
        let _ = write!(
            self.body,
            r#"            <p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>
"#,
            id = id,
            name = escape(shape.placeholder.name.as_str()),
            ph = placeholder_element(&shape.placeholder),
            paragraphs = paragraphs,
        );
    }

    fn paragraph(&mut self, paragraph: &Paragraph) -> String {
        let mut ppr_children = String::new();
        if let Some(line) = paragraph.line_spacing_pt {
            let _ = write!(ppr_children, r#"<a:lnSpc><a:spcPts val="{}"/></a:lnSpc>"#, points(line));
        }
        if let Some(before) = paragraph.space_before_pt {
            let _ = write!(ppr_children, r#"<a:spcBef><a:spcPts val="{}"/></a:spcBef>"#, points(before));
        }
        match &paragraph.bullet {
            None => {}
            Some(Bullet::None) => ppr_children.push_str("<a:buNone/>"),
            Some(Bullet::Char(ch)) => {
                let _ = write!(
                    ppr_children,
                    r#"<a:buFont typeface="Arial"/><a:buChar char="{}"/>"#,
                    escape(ch.as_str())
                );
            }
            Some(Bullet::AutoNumber { scheme, start }) => {
                let _ = write!(ppr_children, r#"<a:buFont typeface="+mj-lt"/><a:buAutoNum type="{}""#, escape(scheme.as_str()));
                if *start != 1 {
                    let _ = write!(ppr_children, r#" startAt="{}""#, start);
                }
                ppr_children.push_str("/>");
            }
        }

        let mut xml = String::from("<a:p>");
        let lvl = if paragraph.level > 0 {
            format!(r#" lvl="{}""#, paragraph.level.min(8))
        } else {
            String::new()
        };
        if ppr_children.is_empty() {
            if !lvl.is_empty() {
                let _ = write!(xml, "<a:pPr{}/>", lvl);
            }
        } else {
            let _ = write!(xml, "<a:pPr{}>{}</a:pPr>", lvl, ppr_children);
        }

        for run in &paragraph.runs {
            if run.text.is_empty() {
                continue;
            }
            let rpr = self.run_properties(run, paragraph);
            let _ = write!(xml, "<a:r>{}<a:t>{}</a:t></a:r>", rpr, escape(run.text.as_str()));
        }

        let size = paragraph
            .font_pt
            .map(|pt| format!(r#" sz="{}""#, points(pt)))
            .unwrap_or_default();
        let _ = write!(xml, r#"<a:endParaRPr lang="en-US"{} dirty="0"/></a:p>"#, size);
        xml
    }

    fn run_properties(&mut self, run: &StyledRun, paragraph: &Paragraph) -> String {
        let mut attrs = String::from(r#" lang="en-US""#);
        if let Some(pt) = paragraph.font_pt {
            let _ = write!(attrs, r#" sz="{}""#, points(pt));
        }
        let flag = |inline: bool, configured: Option<bool>| match (inline, configured) {
            (true, _) | (false, Some(true)) => Some("1"),
            (false, Some(false)) => Some("0"),
            (false, None) => None,
        };
        if let Some(b) = flag(run.bold, paragraph.bold) {
            let _ = write!(attrs, r#" b="{}""#, b);
        }
        if let Some(i) = flag(run.italic, paragraph.italic) {
            let _ = write!(attrs, r#" i="{}""#, i);
        }
        attrs.push_str(r#" dirty="0""#);

        let mut children = String::new();
        if run.monospace {
            let _ = write!(children, r#"<a:latin typeface="{}"/>"#, MONOSPACE_FONT);
        }
        if let Some(url) = &run.link {
            let rid = self.add_relationship(REL_HYPERLINK, url, true);
            let _ = write!(children, r#"<a:hlinkClick r:id="{}"/>"#, rid);
        }

        if children.is_empty() {
            format!("<a:rPr{}/>", attrs)
        } else {
            format!("<a:rPr{}>{}</a:rPr>", attrs, children)
        }
    }

    fn picture(&mut self, picture: &PictureShape, media_target: &str) -> Result<()> {
        let id = self.shape_id();
        let rid = self.add_relationship(REL_IMAGE, media_target, false);
        let placement = &picture.placement;
        let style = &placement.style;

        let src_rect = placement
            .crop
            .map(|c| {
                format!(
                    r#"<a:srcRect l="{}" t="{}" r="{}" b="{}"/>"#,
                    c.left, c.top, c.right, c.bottom
                )
            })
            .unwrap_or_default();

        let geometry = if style.rounded_enabled {
            format!(
                r#"<a:prstGeom prst="roundRect"><a:avLst><a:gd name="adj" fmla="val {}"/></a:avLst></a:prstGeom>"#,
                style.corner_adj()
            )
        } else {
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#.to_string()
        };

        let line = if style.border_enabled {
            format!(
                r#"<a:ln w="{}">{}</a:ln>"#,
                style.border_width_emu(),
                solid_fill(&style.border_rgb()?)
            )
        } else {
            "<a:ln><a:noFill/></a:ln>".to_string()
        };

        let _ = write!(
            self.body,
            r#"            <p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}" descr="{descr}"/><p:cNvPicPr><a:picLocks noGrp="1" noChangeAspect="1"/></p:cNvPicPr><p:nvPr>{ph}</p:nvPr></p:nvPicPr><p:blipFill><a:blip r:embed="{rid}"/>{src_rect}<a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{xfrm}{geometry}{line}</p:spPr></p:pic>
"#,
            id = id,
            descr = escape(placement.src.as_str()),
            ph = placeholder_element(&picture.placeholder),
            rid = rid,
            src_rect = src_rect,
            xfrm = xfrm(&placement.frame),
            geometry = geometry,
            line = line,
        );
        Ok(())
    }

    fn caption(&mut self, caption: &CaptionBox) -> Result<()> {
        let id = self.shape_id();
        let style = &caption.style;
        let algn = match style.align.to_ascii_lowercase().as_str() {
            "center" | "ctr" => "ctr",
            "right" | "r" => "r",
            _ => "l",
        };
        let fill = solid_fill(&style.rgb()?);
        let mut paragraphs = String::new();
        for line in &caption.lines {
            let _ = write!(
                paragraphs,
                r#"<a:p><a:pPr algn="{algn}"/><a:r><a:rPr lang="en-US" sz="{sz}" dirty="0">{fill}</a:rPr><a:t>{text}</a:t></a:r></a:p>"#,
                algn = algn,
                sz = points(style.font_pt),
                fill = fill,
                text = escape(line.as_str()),
            );
        }
        let _ = write!(
            self.body,
            r#"            <p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Caption {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>
"#,
            id = id,
            xfrm = xfrm(&caption.frame),
            paragraphs = paragraphs,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::{CaptionStyle, Crop, ImagePlacement, ImageStyle};
    use crate::layouts::{LayoutHandle, PlaceholderKind};
    use crate::placeholders::PlaceholderRole;
    use std::path::PathBuf;

    fn text_slide(paragraphs: Vec<Paragraph>) -> Slide {
        let mut placeholder = PlaceholderDescriptor::new(PlaceholderKind::Body, "Content <1>", 1);
        placeholder.ph_type = Some("body".into());
        Slide {
            layout_name: "Text".into(),
            layout: LayoutHandle {
                position: 1,
                part: "ppt/slideLayouts/slideLayout2.xml".into(),
            },
            section: None,
            shapes: vec![SlideShape::Text(TextShape {
                role: PlaceholderRole::Body,
                placeholder,
                paragraphs,
            })],
        }
    }

    fn no_images(_: &Path) -> Result<String> {
        panic!("no images expected")
    }

    fn paragraph(runs: Vec<StyledRun>) -> Paragraph {
        Paragraph {
            runs,
            level: 0,
            bullet: None,
            font_pt: None,
            bold: None,
            italic: None,
            space_before_pt: None,
            line_spacing_pt: None,
        }
    }

    #[test]
    fn test_text_shape_xml() {
        let mut bullet = paragraph(vec![StyledRun::plain("a < b")]);
        bullet.level = 1;
        bullet.bullet = Some(Bullet::Char("\u{2022}".into()));
        bullet.font_pt = Some(20.0);
        bullet.space_before_pt = Some(6.0);
        let rendered = render_slide(
            &text_slide(vec![bullet]),
            "../slideLayouts/slideLayout2.xml",
            &mut no_images,
        )
        .unwrap();
        let xml = &rendered.xml;
        assert!(xml.contains(r#"name="Content &lt;1&gt;""#));
        assert!(xml.contains(r#"<p:ph type="body" idx="1"/>"#));
        assert!(xml.contains(r#"<a:pPr lvl="1"><a:spcBef><a:spcPts val="600"/></a:spcBef><a:buFont typeface="Arial"/><a:buChar char="•"/></a:pPr>"#));
        assert!(xml.contains(r#"<a:rPr lang="en-US" sz="2000" dirty="0"/><a:t>a &lt; b</a:t>"#));
        assert_eq!(rendered.relationships.len(), 1);
        assert_eq!(rendered.relationships[0].rel_type, REL_SLIDE_LAYOUT);
    }

    #[test]
    fn test_numbering_link_and_code_runs() {
        let mut numbered = paragraph(vec![
            StyledRun {
                text: "docs".into(),
                link: Some("https://example.com/?a=1&b=2".into()),
                ..StyledRun::default()
            },
            StyledRun {
                text: "x".into(),
                monospace: true,
                bold: true,
                ..StyledRun::default()
            },
        ]);
        numbered.bullet = Some(Bullet::AutoNumber {
            scheme: "arabicPeriod".into(),
            start: 3,
        });
        numbered.italic = Some(false);
        let rendered = render_slide(&text_slide(vec![numbered]), "layout.xml", &mut no_images).unwrap();
        assert!(rendered.xml.contains(r#"<a:buAutoNum type="arabicPeriod" startAt="3"/>"#));
        assert!(rendered.xml.contains(r#"<a:hlinkClick r:id="rId2"/>"#));
        assert!(rendered.xml.contains(r#"b="1" i="0" dirty="0"><a:latin typeface="Courier New"/>"#));
        let link = &rendered.relationships[1];
        assert_eq!(link.rel_type, REL_HYPERLINK);
        assert!(link.external);
        assert_eq!(link.target, "https://example.com/?a=1&b=2");
    }

    #[test]
    fn test_picture_and_caption_xml() {
        let mut placeholder = PlaceholderDescriptor::new(PlaceholderKind::Picture, "Picture Placeholder 2", 13);
        placeholder.ph_type = Some("pic".into());
        let frame = Frame { x: 10, y: 20, cx: 300, cy: 400 };
        let mut slide = text_slide(vec![]);
        slide.shapes = vec![
            SlideShape::Picture(PictureShape {
                placeholder,
                placement: ImagePlacement {
                    src: "chart.png".into(),
                    path: PathBuf::from("/assets/chart.png"),
                    frame,
                    crop: Some(Crop { left: 100, right: 100, ..Crop::default() }),
                    style: ImageStyle::default(),
                    caption: None,
                },
            }),
            SlideShape::Caption(CaptionBox {
                frame,
                lines: vec!["First".into(), "Second".into()],
                style: CaptionStyle::default(),
            }),
        ];
        let mut embedded = Vec::new();
        let mut embed = |path: &Path| -> Result<String> {
            embedded.push(path.to_path_buf());
            Ok("../media/image1.png".to_string())
        };
        let rendered = render_slide(&slide, "layout.xml", &mut embed).unwrap();
        assert_eq!(embedded, vec![PathBuf::from("/assets/chart.png")]);
        let xml = &rendered.xml;
        assert!(xml.contains(r#"<p:ph type="pic" idx="13"/>"#));
        assert!(xml.contains(r#"<a:srcRect l="100" t="0" r="100" b="0"/>"#));
        assert!(xml.contains(r#"<a:prstGeom prst="roundRect"><a:avLst><a:gd name="adj" fmla="val 10000"/></a:avLst></a:prstGeom>"#));
        assert!(xml.contains(r#"<a:ln w="25400"><a:solidFill><a:srgbClr val="44546A"/></a:solidFill></a:ln>"#));
        assert_eq!(xml.matches(r#"<a:pPr algn="l"/>"#).count(), 2);
        assert!(xml.contains(r#"sz="1200""#));
        assert_eq!(rendered.relationships[1].target, "../media/image1.png");
    }
}
