// src/llm/prompts.rs
use crate::llm::response::NO_MATCH_ANSWER;
use crate::llm::LlmRequest;

const ANALYST_SYSTEM: &str = "Du bist ein Experte für die Analyse technischer Dokumente und Lastenhefte. \
Du antwortest knapp, ausschließlich auf Basis des gelieferten Textes und erfindest keine Inhalte.";

pub fn similarity_prompt(keyword: &str, context: &str) -> LlmRequest {
    let prompt = format!(
        "Finde im folgenden Text einen Begriff, der dem Suchbegriff '{keyword}' funktional ähnlich ist \
(Synonym, Oberbegriff oder technische Entsprechung).\n\n\
Antworte exakt in diesem Format:\n\
Similar Results for the keyword '{keyword}': <Begriff>\n\
<vollständiger Satz aus dem Text, der den Begriff enthält>\n\n\
Wenn es keinen passenden Begriff gibt, antworte exakt: {NO_MATCH_ANSWER}.\n\n\
Text:\n{context}"
    );
    LlmRequest {
        system: Some(ANALYST_SYSTEM.to_string()),
        prompt,
        max_tokens: 1024,
        temperature: 0.0,
    }
}

pub fn section_prompt(keyword: &str, context: &str) -> LlmRequest {
    let prompt = format!(
        "Der folgende Ausschnitt stammt aus einem technischen Dokument. Gib den Abschnitt wörtlich zurück, \
der den Begriff '{keyword}' behandelt. Beginne mit dem ersten Satz des Abschnitts und ende vor der \
nächsten Überschrift. Antworte nur mit dem Abschnittstext ohne Kommentar.\n\n\
Wenn der Ausschnitt nichts zu '{keyword}' enthält, antworte exakt: {NO_MATCH_ANSWER}.\n\n\
Ausschnitt:\n{context}"
    );
    LlmRequest {
        system: Some(ANALYST_SYSTEM.to_string()),
        prompt,
        max_tokens: 2048,
        temperature: 0.0,
    }
}

pub fn question_prompt(query: &str, context: &str) -> LlmRequest {
    let prompt = format!(
        "Beantworte die folgende Frage ausschließlich anhand des Dokumentauszugs. Nenne konkrete Werte \
und Bezeichnungen so, wie sie im Text stehen.\n\n\
Wenn der Auszug die Frage nicht beantwortet, antworte exakt: {NO_MATCH_ANSWER}.\n\n\
Frage: {query}\n\n\
Dokumentauszug:\n{context}"
    );
    LlmRequest {
        system: Some(ANALYST_SYSTEM.to_string()),
        prompt,
        max_tokens: 1024,
        temperature: 0.2,
    }
}

pub fn toc_prompt(chunk: &str) -> LlmRequest {
    let prompt = format!(
        "Erkenne alle Überschriften im folgenden Textausschnitt. Antworte ausschließlich mit einem JSON-Array \
in einem ```json Block:\n\
[{{\"title\": \"<Überschrift wie im Text>\", \"level\": <1-6>, \"position\": <Zeichenposition im Ausschnitt>}}]\n\
Gibt es keine Überschriften, antworte mit [].\n\n\
Textausschnitt:\n{chunk}"
    );
    LlmRequest {
        system: Some(ANALYST_SYSTEM.to_string()),
        prompt,
        max_tokens: 4096,
        temperature: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_prompt_names_keyword_and_answer_format() {
        let req = similarity_prompt("Heizung", "Der Brenner heizt.");
        assert!(req.prompt.contains("Similar Results for the keyword 'Heizung':"));
        assert!(req.prompt.contains("Keine relevanten Informationen gefunden."));
        assert!(req.prompt.ends_with("Der Brenner heizt."));
        assert!(req.system.is_some());
    }

    #[test]
    fn question_prompt_carries_query_and_context() {
        let req = question_prompt("Wie hoch ist die Arbeitsbreite?", "Arbeitsbreite 2200 mm");
        assert!(req.prompt.contains("Frage: Wie hoch ist die Arbeitsbreite?"));
        assert!(req.prompt.ends_with("Arbeitsbreite 2200 mm"));
    }

    #[test]
    fn toc_prompt_requests_json() {
        let req = toc_prompt("1. Einleitung");
        assert!(req.prompt.contains("\"position\""));
        assert!(req.prompt.contains("```json"));
    }
}
