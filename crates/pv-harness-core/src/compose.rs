//! Prompt assembly and answer interpretation.
//!
//! [`ContextComposer::compose`] wraps retrieved fragments in a fixed
//! template that confines the model to the given context and tells it to
//! reply with the localized "unknown" sentinel when the context falls short.
//! [`ContextComposer::interpret`] turns the reply back into either a usable
//! answer or the standard "not found" notice.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::models::ScoredFragment;
use crate::text::fold_case;

/// Replies shorter than this many characters count as non-answers.
pub const DEFAULT_MIN_ANSWER_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

/// User-facing texts for each non-answer outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notices {
    pub no_documents: &'static str,
    pub no_relevant_info: &'static str,
    pub not_found: &'static str,
    pub provider_error: &'static str,
}

struct Template {
    system: &'static str,
    preamble: &'static str,
    document: &'static str,
    content: &'static str,
    question: &'static str,
    answer: &'static str,
    sentinel: &'static str,
    notices: Notices,
}

const ES: Template = Template {
    system: "Eres un experto en energía fotovoltaica. Responde únicamente con la \
             información del contexto proporcionado y no inventes datos que no \
             aparezcan en él. Si el contexto no basta para responder, contesta \
             exactamente: \"No lo sé\".",
    preamble: "Basado en los siguientes fragmentos de documentos sobre energía \
               fotovoltaica, responde la pregunta de forma precisa y utilizando \
               datos textuales exactos.",
    document: "Documento",
    content: "Contenido",
    question: "Pregunta",
    answer: "Respuesta",
    sentinel: "No lo sé",
    notices: Notices {
        no_documents: "No hay documentos cargados. Sube documentos primero.",
        no_relevant_info: "No se encontró información relevante en los documentos almacenados.",
        not_found: "No se encontró una respuesta en los documentos disponibles.",
        provider_error: "No se pudo obtener una respuesta en este momento. Inténtalo de nuevo.",
    },
};

const EN: Template = Template {
    system: "You are a photovoltaic energy expert. Answer only from the provided \
             context and never invent facts that are not in it. If the context is \
             not enough to answer, reply exactly: \"I don't know\".",
    preamble: "Based on the following fragments of photovoltaic energy documents, \
               answer the question precisely, quoting the text where possible.",
    document: "Document",
    content: "Content",
    question: "Question",
    answer: "Answer",
    sentinel: "I don't know",
    notices: Notices {
        no_documents: "No documents loaded yet. Upload documents first.",
        no_relevant_info: "No relevant information was found in the stored documents.",
        not_found: "No answer was found in the available documents.",
        provider_error: "The answer is unavailable right now. Please try again.",
    },
};

/// Result of [`ContextComposer::interpret`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub is_known: bool,
    pub display_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextComposer {
    language: Language,
    sentinel: String,
    min_answer_chars: usize,
}

impl Default for ContextComposer {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

impl ContextComposer {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            sentinel: template(language).sentinel.to_string(),
            min_answer_chars: DEFAULT_MIN_ANSWER_CHARS,
        }
    }

    /// Override the "unknown" phrase the model is told to use.
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_min_answer_chars(mut self, min: usize) -> Self {
        self.min_answer_chars = min;
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn notices(&self) -> &'static Notices {
        &template(self.language).notices
    }

    /// System instructions sent alongside every composed prompt.
    pub fn system_instructions(&self) -> String {
        let t = template(self.language);
        if self.sentinel == t.sentinel {
            t.system.to_string()
        } else {
            t.system.replace(t.sentinel, &self.sentinel)
        }
    }

    /// Build the user prompt from the question and retrieved fragments.
    pub fn compose(&self, query: &str, retrieved: &[ScoredFragment]) -> String {
        let t = template(self.language);
        let mut prompt = String::new();
        prompt.push_str(t.preamble);
        prompt.push_str("\n\n");
        for (i, frag) in retrieved.iter().enumerate() {
            let _ = write!(
                prompt,
                "[{}] {}: {}\n{}: {}\n\n",
                i + 1,
                t.document,
                frag.document,
                t.content,
                frag.text.trim()
            );
        }
        let _ = write!(prompt, "{}: {}\n\n{}:", t.question, query.trim(), t.answer);
        prompt
    }

    /// Classify a model reply as an answer or a non-answer.
    pub fn interpret(&self, answer: &str) -> Interpretation {
        let trimmed = answer.trim();
        let unknown = fold_case(trimmed).contains(&fold_case(&self.sentinel))
            || trimmed.chars().count() < self.min_answer_chars;
        if unknown {
            Interpretation {
                is_known: false,
                display_text: self.notices().not_found.to_string(),
            }
        } else {
            Interpretation {
                is_known: true,
                display_text: trimmed.to_string(),
            }
        }
    }
}

fn template(language: Language) -> &'static Template {
    match language {
        Language::Es => &ES,
        Language::En => &EN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(doc: &str, text: &str) -> ScoredFragment {
        ScoredFragment {
            document: doc.to_string(),
            ordinal: 0,
            text: text.to_string(),
            score: 0.8,
        }
    }

    #[test]
    fn test_compose_embeds_query_and_fragments() {
        let c = ContextComposer::default();
        let prompt = c.compose(
            "¿Cómo funcionan los paneles solares?",
            &[scored("guia.pdf", "Los paneles solares convierten la luz en electricidad.")],
        );
        assert!(prompt.contains("[1] Documento: guia.pdf"));
        assert!(prompt.contains("convierten la luz en electricidad"));
        assert!(prompt.contains("Pregunta: ¿Cómo funcionan los paneles solares?"));
        assert!(prompt.ends_with("Respuesta:"));
    }

    #[test]
    fn test_system_instructions_mention_sentinel() {
        let c = ContextComposer::new(Language::En);
        assert!(c.system_instructions().contains("\"I don't know\""));
        let c = ContextComposer::default().with_sentinel("Sin datos");
        assert!(c.system_instructions().contains("\"Sin datos\""));
    }

    #[test]
    fn test_interpret_sentinel_is_unknown() {
        let c = ContextComposer::default();
        let i = c.interpret("Lo siento, no lo se con la información dada.");
        assert!(!i.is_known);
        assert_eq!(i.display_text, c.notices().not_found);
    }

    #[test]
    fn test_interpret_short_answer_is_unknown() {
        let c = ContextComposer::default();
        assert!(!c.interpret("  Sí.  ").is_known);
    }

    #[test]
    fn test_interpret_real_answer() {
        let c = ContextComposer::default();
        let i = c.interpret(" Convierten la luz solar en electricidad mediante el efecto fotovoltaico. ");
        assert!(i.is_known);
        assert!(i.display_text.starts_with("Convierten"));
    }
}
