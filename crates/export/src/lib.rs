//! Word document export for tumor board reviews.
//!
//! [`ContentExportPlugin::export_to_word_doc`] renders a `.docx` template with
//! the request fields and the conversation's artifacts (clinical summary,
//! timeline, trials, papers, images) and stores the result as a chat artifact.

pub mod content_export;
pub mod docx;
pub mod images;
pub mod summary;
pub mod template;
pub mod timeline_image;

pub use content_export::{ContentExportPlugin, ExportRequest};
pub use docx::{DocxContext, DocxTemplate, InlineImage, RichText};
pub use images::get_patient_images;
pub use summary::ClinicalSummarizer;
pub use template::default_template;
pub use timeline_image::create_timeline_images_by_height;
