use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};

use crate::layout::domain::document_writer::DocumentWriter;
use crate::layout::domain::page_geometry::{to_bottom_left, PageRect, PageSize};
use crate::shared::constants::JPEG_QUALITY;
use crate::shared::frame::Frame;

const CATALOG_ID: Ref = Ref::new(1);
const PAGE_TREE_ID: Ref = Ref::new(2);

/// Writes pages to a PDF, embedding every image as a JPEG (DCTDecode).
///
/// Each image is compressed and written into the document as soon as it is
/// drawn, so only the encoded bytes are held, never the pixel buffers.
pub struct PdfDocumentWriter {
    pdf: Option<Pdf>,
    page: PageSize,
    jpeg_quality: u8,
    next_id: i32,
    page_ids: Vec<Ref>,
    content: Content,
    images: Vec<(String, Ref)>,
}

impl PdfDocumentWriter {
    pub fn new(page: PageSize) -> Self {
        Self {
            pdf: Some(Pdf::new()),
            page,
            jpeg_quality: JPEG_QUALITY,
            next_id: PAGE_TREE_ID.get() + 1,
            page_ids: Vec::new(),
            content: Content::new(),
            images: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn alloc(&mut self) -> Ref {
        let id = Ref::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn pdf_mut(&mut self) -> Result<&mut Pdf, Box<dyn std::error::Error>> {
        self.pdf
            .as_mut()
            .ok_or_else(|| "document already saved".into())
    }

    fn encode_jpeg(&self, image: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let color = match image.channels() {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            n => return Err(format!("unsupported channel count: {n}").into()),
        };
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality).encode(
            image.data(),
            image.width(),
            image.height(),
            color,
        )?;
        Ok(bytes)
    }
}

impl DocumentWriter for PdfDocumentWriter {
    fn draw_image(
        &mut self,
        image: &Frame,
        target: &PageRect,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if image.width() == 0 || image.height() == 0 {
            return Err("cannot embed an empty image".into());
        }
        let jpeg = self.encode_jpeg(image)?;
        let image_id = self.alloc();
        let gray = image.channels() == 1;

        let pdf = self.pdf_mut()?;
        let mut xobject = pdf.image_xobject(image_id, &jpeg);
        xobject.filter(Filter::DctDecode);
        xobject.width(image.width() as i32);
        xobject.height(image.height() as i32);
        if gray {
            xobject.color_space().device_gray();
        } else {
            xobject.color_space().device_rgb();
        }
        xobject.bits_per_component(8);
        xobject.finish();

        let name = format!("Im{}", self.images.len());
        let placed = to_bottom_left(target, self.page.height);
        self.content.save_state();
        self.content.transform([
            placed.width as f32,
            0.0,
            0.0,
            placed.height as f32,
            placed.x as f32,
            placed.y as f32,
        ]);
        self.content.x_object(Name(name.as_bytes()));
        self.content.restore_state();
        self.images.push((name, image_id));
        Ok(())
    }

    fn show_page(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let page_id = self.alloc();
        let content_id = self.alloc();
        let content = std::mem::replace(&mut self.content, Content::new()).finish();
        let images = std::mem::take(&mut self.images);
        let media_box = Rect::new(0.0, 0.0, self.page.width as f32, self.page.height as f32);

        let pdf = self.pdf_mut()?;
        let mut page = pdf.page(page_id);
        page.media_box(media_box);
        page.parent(PAGE_TREE_ID);
        page.contents(content_id);
        {
            let mut resources = page.resources();
            let mut xobjects = resources.x_objects();
            for (name, id) in &images {
                xobjects.pair(Name(name.as_bytes()), *id);
            }
        }
        page.finish();
        pdf.stream(content_id, &content);

        self.page_ids.push(page_id);
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let mut pdf = self.pdf.take().ok_or("document already saved")?;
        pdf.catalog(CATALOG_ID).pages(PAGE_TREE_ID);
        pdf.pages(PAGE_TREE_ID)
            .kids(self.page_ids.iter().copied())
            .count(self.page_ids.len() as i32);
        let bytes = pdf.finish();

        let partial = partial_path(path);
        fs::write(&partial, bytes)?;
        if let Err(e) = fs::rename(&partial, path) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        log::debug!(
            "Wrote {} page(s) to {}",
            self.page_ids.len(),
            path.display()
        );
        Ok(())
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
