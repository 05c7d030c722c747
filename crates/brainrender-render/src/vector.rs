//! Vector containers around a rasterised frame.
//!
//! The software backend only produces pixels, so `svg`, `eps` and `pdf`
//! screenshots embed the image at its native size: a PNG data URI for SVG,
//! a hex `colorimage` for EPS and a deflated image XObject for PDF.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;

use crate::screenshot::{save_to_buffer, ScreenshotError};

const BASE64_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const HEX_BYTES_PER_LINE: usize = 32;

/// RGB samples, row by row from the top, alpha dropped.
fn rgb_samples(image: &RgbaImage) -> Vec<u8> {
    image.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect()
}

fn base64(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() / 3 * 4 + 4);
    for chunk in bytes.chunks(3) {
        let b = [chunk[0], chunk.get(1).copied().unwrap_or(0), chunk.get(2).copied().unwrap_or(0)];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        for i in 0..4 {
            if i <= chunk.len() {
                out.push(char::from(BASE64_ALPHABET[(n >> (18 - 6 * i)) as usize & 63]));
            } else {
                out.push('=');
            }
        }
    }
    out
}

/// An SVG document holding the frame as an embedded PNG.
pub fn write_svg<W: Write>(out: &mut W, image: &RgbaImage) -> Result<(), ScreenshotError> {
    let (w, h) = image.dimensions();
    let png = save_to_buffer(image)?;
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    )?;
    writeln!(
        out,
        r#"<image x="0" y="0" width="{w}" height="{h}" xlink:href="data:image/png;base64,{}"/>"#,
        base64(&png)
    )?;
    writeln!(out, "</svg>")?;
    Ok(())
}

/// An encapsulated PostScript file drawing the frame with `colorimage`.
pub fn write_eps<W: Write>(out: &mut W, image: &RgbaImage) -> Result<(), ScreenshotError> {
    let (w, h) = image.dimensions();
    writeln!(out, "%!PS-Adobe-3.0 EPSF-3.0")?;
    writeln!(out, "%%BoundingBox: 0 0 {w} {h}")?;
    writeln!(out, "%%Creator: brainrender-rs")?;
    writeln!(out, "%%EndComments")?;
    writeln!(out, "gsave")?;
    writeln!(out, "{w} {h} scale")?;
    writeln!(out, "/row {w} 3 mul string def")?;
    writeln!(out, "{w} {h} 8 [{w} 0 0 {h} neg 0 {h}] {{currentfile row readhexstring pop}} false 3 colorimage")?;
    for line in rgb_samples(image).chunks(HEX_BYTES_PER_LINE) {
        for byte in line {
            write!(out, "{byte:02x}")?;
        }
        writeln!(out)?;
    }
    writeln!(out, "grestore")?;
    writeln!(out, "showpage")?;
    writeln!(out, "%%EOF")?;
    Ok(())
}

/// A one-page PDF whose page is the frame, one point per pixel.
pub fn write_pdf<W: Write>(out: &mut W, image: &RgbaImage) -> Result<(), ScreenshotError> {
    let (w, h) = image.dimensions();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&rgb_samples(image))?;
    let pixels = encoder.finish()?;
    let content = format!("q {w} 0 0 {h} 0 0 cm /Im0 Do Q\n");

    let mut doc: Vec<u8> = Vec::new();
    let mut offsets = Vec::with_capacity(5);
    doc.extend_from_slice(b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n");

    offsets.push(doc.len());
    doc.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    offsets.push(doc.len());
    doc.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");
    offsets.push(doc.len());
    writeln!(
        doc,
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {w} {h}] \
         /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>\nendobj"
    )?;
    offsets.push(doc.len());
    writeln!(
        doc,
        "4 0 obj\n<< /Type /XObject /Subtype /Image /Width {w} /Height {h} /ColorSpace /DeviceRGB \
         /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>\nstream",
        pixels.len()
    )?;
    doc.extend_from_slice(&pixels);
    doc.extend_from_slice(b"\nendstream\nendobj\n");
    offsets.push(doc.len());
    writeln!(doc, "5 0 obj\n<< /Length {} >>\nstream\n{content}endstream\nendobj", content.len())?;

    let xref = doc.len();
    writeln!(doc, "xref\n0 {}\n0000000000 65535 f ", offsets.len() + 1)?;
    for offset in &offsets {
        writeln!(doc, "{offset:010} 00000 n ")?;
    }
    writeln!(
        doc,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF",
        offsets.len() + 1
    )?;
    out.write_all(&doc)?;
    Ok(())
}
