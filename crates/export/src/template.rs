//! The bundled tumor board review layout, written by `tumorboard onboard`
//! when no template exists yet.

use tumorboard_core::error::ExportError;

use crate::docx::scaffold_docx;

fn heading(text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>{text}</w:t></w:r></w:p>"#
    )
}

fn line(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

fn cell(text: &str) -> String {
    format!(r#"<w:tc><w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p></w:tc>"#)
}

fn row(cells: &[&str]) -> String {
    format!("<w:tr>{}</w:tr>", cells.iter().map(|c| cell(c)).collect::<String>())
}

/// `word/document.xml` body of the default template.
pub fn default_template_body() -> String {
    let table = format!(
        "<w:tbl>{}{}{}{}</w:tbl>",
        row(&["Date", "Event", "Summary"]),
        row(&["{%tr for e in clinical_timeline %}"]),
        row(&["{{ e.date }}", "{{ e.note_title }}", "{{ e.note_summary }}"]),
        row(&["{%tr endfor %}"]),
    );

    [
        heading("Tumor Board Review"),
        line("Patient: {{ patient_initials }} ({{ patient_id }}), {{ patient_age }}, {{ patient_sex }}"),
        line("Diagnosis: {{ patient_dx }}"),
        line("Clinical stage: {{ clinical_stage }}"),
        line("Reason for presentation: {{ reason_for_presentation }}"),
        line("Clinical history: {{ clinical_history }}"),
        line("Past medical history: {{ past_med_history }}"),
        line("Past surgical history: {{ past_surgical_history }}"),
        heading("Previous Treatment"),
        line("{%p for t in previous_treatment %}"),
        line("- {{ t }}"),
        line("{%p endfor %}"),
        heading("Clinical Summary"),
        line("{%p for s in clinical_summary %}"),
        line("- {{ s }}"),
        line("{%p endfor %}"),
        heading("Clinical Timeline"),
        line("{%p for img in timeline_images %}"),
        line("{{ img }}"),
        line("{%p endfor %}"),
        table,
        heading("Imaging"),
        line("{% for img in radiology_images %}{{ img }} {% endfor %}"),
        heading("Pathology"),
        line("{% for img in pathology_images %}{{ img }} {% endfor %}"),
        heading("Clinical Trials"),
        line("{%p for t in clinical_trials %}"),
        line("{{ t.title }}: {{ t.summary }}"),
        line("{%p endfor %}"),
        heading("Research Papers"),
        line("{%p for p in research_papers %}"),
        line("{{ p.title }} ({{ p.authors }})"),
        line("{%p endfor %}"),
        heading("Treatment Recommendation"),
        line("{{ treatment_recommendation }}"),
    ]
    .concat()
}

pub fn default_template() -> Result<Vec<u8>, ExportError> {
    scaffold_docx(&default_template_body())
}
