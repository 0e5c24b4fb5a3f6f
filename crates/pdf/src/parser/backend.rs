use std::collections::BTreeMap;

use lopdf::{self, content::Content};

use crate::PdfError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// A simplified, lopdf-independent representation of a PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// Alpha channel attached to an image through its `/SMask` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMask {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub data: Vec<u8>,
}

/// An image XObject with its stream filters already applied.
///
/// `filter` names the encoding still present in `data`: `None` for raw
/// samples, `Some("DCTDecode")` for a JPEG payload the backend cannot expand.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    /// Device colour space name, with `ICCBased` profiles resolved to the
    /// device space matching their component count.
    pub color_space: Option<String>,
    pub filter: Option<String>,
    pub data: Vec<u8>,
    pub soft_mask: Option<RawMask>,
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// Stream dictionaries are converted but the raw stream bytes are discarded.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(
            dict.iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect(),
        ),
        lopdf::Object::Stream(stream) => PdfValue::Dict(
            stream
                .dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect(),
        ),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// UTF-16BE with BOM first, then UTF-8, then Latin-1.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let code_units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Decoding used when a font's encoding cannot be resolved.
///
/// `two_byte` marks `Identity-H`/`Identity-V` fonts, whose 2-byte CIDs
/// usually coincide with UTF-16BE code units.
pub fn decode_text_fallback(bytes: &[u8], two_byte: bool) -> String {
    if two_byte && bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let code_units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        let decoded = String::from_utf16_lossy(&code_units);
        if !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
            return decoded;
        }
    }

    decode_text_simple(bytes)
}

// ---------------------------------------------------------------------------
// Text decoders
// ---------------------------------------------------------------------------

/// Turns the bytes of a shown string into text for one resolved font.
pub trait TextDecoder {
    fn decode(&self, bytes: &[u8]) -> String;
}

/// Decoder in effect before any `Tf`, or for a font the page does not define.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl TextDecoder for PlainText {
    fn decode(&self, bytes: &[u8]) -> String {
        decode_text_simple(bytes)
    }
}

/// A page font with its encoding (and `ToUnicode` map) resolved through lopdf.
struct LopdfFont<'a> {
    encoding: Option<lopdf::Encoding<'a>>,
    two_byte: bool,
}

impl TextDecoder for LopdfFont<'_> {
    fn decode(&self, bytes: &[u8]) -> String {
        self.encoding
            .as_ref()
            .and_then(|enc| lopdf::Document::decode_text(enc, bytes).ok())
            .unwrap_or_else(|| decode_text_fallback(bytes, self.two_byte))
    }
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// Abstraction over a PDF parsing backend (currently backed by `lopdf`).
///
/// The content extractor only talks to this trait, so it can be exercised
/// against mock pages without building real documents.
pub trait PdfBackend {
    /// Return a mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Return the raw (possibly compressed) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError>;

    /// Resolve the font `font_name` from the page's resources into a decoder
    /// for the strings shown with it. Called once per `Tf`.
    fn font_decoder(&self, page: PageId, font_name: &[u8]) -> Box<dyn TextDecoder + '_>;

    /// Resolve the image XObject painted by `Do /name` on the given page.
    ///
    /// The page's own resources are searched first, then resources inherited
    /// from ancestor page-tree nodes. Returns `Ok(None)` when the name does
    /// not refer to an image (missing, or a form XObject).
    fn page_image(&self, page: PageId, name: &[u8]) -> Result<Option<RawImage>, PdfError>;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc =
            lopdf::Document::load_mem(data).map_err(|e| PdfError::Unreadable(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    // -- private helpers ----------------------------------------------------

    /// Resolve an object to itself or, for a reference, the object it points to.
    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a lopdf::Object) -> Option<&'a lopdf::Dictionary> {
        self.resolve(obj).as_dict().ok()
    }

    /// Look `name` up in `dict/Resources/XObject`, walking up through
    /// `Parent` links until a node holds it.
    fn find_xobject<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        name: &[u8],
    ) -> Option<&'a lopdf::Stream> {
        let local = dict
            .get(b"Resources")
            .ok()
            .and_then(|r| self.resolve_dict(r))
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|x| self.resolve_dict(x))
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|obj| self.resolve(obj).as_stream().ok());

        if local.is_some() {
            return local;
        }

        let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent = self.doc.get_object(parent_id).ok()?.as_dict().ok()?;
        self.find_xobject(parent, name)
    }

    /// Resolve an image's `/ColorSpace` entry to a device colour space name.
    fn color_space_name(&self, dict: &lopdf::Dictionary) -> Option<String> {
        let obj = self.resolve(dict.get(b"ColorSpace").ok()?);
        match obj {
            lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
            lopdf::Object::Array(arr) => {
                let family = arr.first()?.as_name().ok()?;
                if family == b"ICCBased" {
                    let profile = self.resolve(arr.get(1)?).as_stream().ok()?;
                    let n = profile.dict.get(b"N").ok()?.as_i64().ok()?;
                    let device = match n {
                        1 => "DeviceGray",
                        3 => "DeviceRGB",
                        4 => "DeviceCMYK",
                        _ => return None,
                    };
                    Some(device.to_string())
                } else {
                    Some(String::from_utf8_lossy(family).into_owned())
                }
            }
            _ => None,
        }
    }

    /// Return the stream's samples after every filter lopdf can undo, plus
    /// the name of the filter still applied (if any).
    fn stream_samples(stream: &lopdf::Stream) -> Result<(Vec<u8>, Option<String>), PdfError> {
        let filters = filter_names(&stream.dict);
        match filters.last().map(String::as_str) {
            None => Ok((stream.content.clone(), None)),
            Some(last @ ("DCTDecode" | "JPXDecode" | "CCITTFaxDecode" | "JBIG2Decode")) => {
                if filters.len() > 1 {
                    return Err(PdfError::Image(format!(
                        "unsupported filter chain {:?}",
                        filters
                    )));
                }
                Ok((stream.content.clone(), Some(last.to_string())))
            }
            Some(_) => stream
                .decompressed_content()
                .map(|bytes| (bytes, None))
                .map_err(|e| PdfError::Image(format!("cannot decompress image stream: {}", e))),
        }
    }

    fn soft_mask(&self, dict: &lopdf::Dictionary) -> Option<RawMask> {
        let stream = self.resolve(dict.get(b"SMask").ok()?).as_stream().ok()?;
        let (data, remaining) = Self::stream_samples(stream).ok()?;
        if remaining.is_some() {
            return None;
        }
        Some(RawMask {
            width: dict_u32(&stream.dict, b"Width")?,
            height: dict_u32(&stream.dict, b"Height")?,
            bits_per_component: dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8) as u8,
            data,
        })
    }
}

fn dict_u32(dict: &lopdf::Dictionary, key: &[u8]) -> Option<u32> {
    let v = dict.get(key).ok()?.as_i64().ok()?;
    u32::try_from(v).ok()
}

/// Collect the filter names of a stream dictionary in application order.
fn filter_names(dict: &lopdf::Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(lopdf::Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Ok(lopdf::Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// PdfBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
        let content = Content::decode(data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn font_decoder(&self, page: PageId, font_name: &[u8]) -> Box<dyn TextDecoder + '_> {
        let font = self
            .doc
            .get_page_fonts(page)
            .ok()
            .and_then(|fonts| fonts.get(font_name).copied());

        let Some(font) = font else {
            log::debug!("font /{} not in page resources", String::from_utf8_lossy(font_name));
            return Box::new(PlainText);
        };

        let two_byte = font
            .get(b"Encoding")
            .and_then(|o| o.as_name())
            .is_ok_and(|n| n.starts_with(b"Identity"));
        let encoding = match font.get_font_encoding(&self.doc) {
            Ok(encoding) => Some(encoding),
            Err(e) => {
                log::debug!("font /{}: {}", String::from_utf8_lossy(font_name), e);
                None
            }
        };

        Box::new(LopdfFont { encoding, two_byte })
    }

    fn page_image(&self, page: PageId, name: &[u8]) -> Result<Option<RawImage>, PdfError> {
        let page_dict = self
            .doc
            .get_object(page)
            .and_then(|o| o.as_dict())
            .map_err(|e| PdfError::Parse(format!("cannot get page object: {}", e)))?;

        let Some(stream) = self.find_xobject(page_dict, name) else {
            return Ok(None);
        };

        let is_image = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|n| n == b"Image");
        if !is_image {
            return Ok(None);
        }

        let label = String::from_utf8_lossy(name).into_owned();
        let width = dict_u32(&stream.dict, b"Width")
            .ok_or_else(|| PdfError::Image(format!("{}: missing /Width", label)))?;
        let height = dict_u32(&stream.dict, b"Height")
            .ok_or_else(|| PdfError::Image(format!("{}: missing /Height", label)))?;
        let (data, filter) = Self::stream_samples(stream)?;

        Ok(Some(RawImage {
            name: label,
            width,
            height,
            bits_per_component: dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8) as u8,
            color_space: self.color_space_name(&stream.dict),
            filter,
            data,
            soft_mask: self.soft_mask(&stream.dict),
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
