//! Local triage rule engine.
//!
//! Pure and deterministic: a symptom set plus optional duration/profile
//! maps to a severity and guidance with no I/O, so triage always works
//! with no network. Authoritative results come from the backend; results
//! produced here are provisional and flagged `is_offline_result`.

mod rules;

use chrono::Utc;

pub use rules::{CombinationRule, Evaluation, RuleTable, Trigger};

use crate::models::{
    ResultId, SeverityLevel, SymptomDuration, SymptomRef, TriageRequest, TriageResult, UserProfile,
};

/// The offline classifier, parameterized by a versioned rule table
#[derive(Debug, Clone)]
pub struct RuleEngine {
    table: RuleTable,
}

impl RuleEngine {
    pub const fn new(table: RuleTable) -> Self {
        Self { table }
    }

    /// Engine backed by the rule table shipped with this build
    pub fn with_embedded_table() -> Self {
        Self::new(RuleTable::embedded().clone())
    }

    pub fn table_version(&self) -> &str {
        &self.table.version
    }

    /// Classify a symptom set into a provisional triage result.
    ///
    /// Never fails: an empty symptom set yields a degraded
    /// "insufficient input" result so the caller always has something
    /// actionable to show.
    pub fn classify(
        &self,
        request: &TriageRequest,
        profile: Option<&UserProfile>,
    ) -> TriageResult {
        if request.symptoms.is_empty() {
            return self.result(SeverityLevel::Low, insufficient_input_text());
        }

        let symptom_ids: Vec<&str> = request.symptoms.iter().map(|s| s.id.as_str()).collect();
        let prolonged = request
            .duration
            .is_some_and(SymptomDuration::is_prolonged);
        let evaluation = self
            .table
            .evaluate(&symptom_ids, prolonged, profile.map(|p| p.age));

        tracing::debug!(
            severity = %evaluation.severity,
            rule_version = self.table_version(),
            "local triage classification"
        );

        let text = guidance_for(&evaluation, &request.symptoms);
        self.result(evaluation.severity, text)
    }

    fn result(&self, severity: SeverityLevel, text: GuidanceText) -> TriageResult {
        TriageResult {
            id: ResultId::new(),
            severity_level: severity,
            explanation: text.explanation,
            guidance_bn: text.guidance_bn,
            guidance_en: text.guidance_en,
            is_offline_result: true,
            rule_version: Some(self.table.version.clone()),
            created_at: Utc::now(),
        }
    }
}

struct GuidanceText {
    explanation: String,
    guidance_bn: String,
    guidance_en: String,
}

fn guidance_for(evaluation: &Evaluation, symptoms: &[SymptomRef]) -> GuidanceText {
    let explanation = match &evaluation.trigger {
        Trigger::EmergencySymptom(id) => {
            let (name_bn, name_en) = symptom_names(id, symptoms);
            format!(
                "জরুরি লক্ষণ সনাক্ত হয়েছে: {name_bn}। এটি গুরুতর হতে পারে।\n\n\
                 Emergency symptom detected: {name_en}. This could be serious."
            )
        }
        Trigger::Combination(ids) => {
            let names: Vec<String> = ids
                .iter()
                .map(|id| symptom_names(id, symptoms).1)
                .collect();
            format!(
                "বিপজ্জনক লক্ষণের সমন্বয় সনাক্ত হয়েছে।\n\n\
                 A concerning combination of symptoms was detected: {}.",
                names.join(", ")
            )
        }
        Trigger::Score { .. } => match evaluation.severity {
            SeverityLevel::High => "একাধিক গুরুতর লক্ষণ সনাক্ত হয়েছে। দ্রুত ডাক্তারের পরামর্শ নিন।\n\n\
                 Multiple significant symptoms detected. Seek medical advice promptly."
                .to_string(),
            SeverityLevel::Medium => "একাধিক লক্ষণ বা দীর্ঘ সময়কাল সনাক্ত হয়েছে। ডাক্তারের পরামর্শ নেওয়া উচিত।\n\n\
                 Multiple symptoms or prolonged duration detected. Medical consultation recommended."
                .to_string(),
            _ => "হালকা লক্ষণ সনাক্ত হয়েছে। ঘরোয়া যত্নে ভালো হওয়া সম্ভব।\n\n\
                 Mild symptoms detected. May improve with home care."
                .to_string(),
        },
    };

    let (guidance_bn, guidance_en) = tier_guidance(evaluation.severity);
    GuidanceText {
        explanation,
        guidance_bn: guidance_bn.to_string(),
        guidance_en: guidance_en.to_string(),
    }
}

fn symptom_names(id: &str, symptoms: &[SymptomRef]) -> (String, String) {
    symptoms
        .iter()
        .find(|s| s.id == id)
        .map_or_else(
            || (id.to_string(), id.to_string()),
            |s| (s.name_bn.clone(), s.name_en.clone()),
        )
}

const fn tier_guidance(severity: SeverityLevel) -> (&'static str, &'static str) {
    match severity {
        SeverityLevel::Emergency => (
            "⚠️ জরুরি অবস্থা!\n\n১. অবিলম্বে নিকটতম হাসপাতালে যান\n২. যদি সম্ভব হয় ৯৯৯ এ কল করুন\n৩. রোগীকে একা রাখবেন না\n৪. শান্ত থাকুন এবং রোগীকে আশ্বস্ত করুন\n\n⛔ এটি চিকিৎসা পরামর্শ নয়। ডাক্তারের সাথে যোগাযোগ করুন।",
            "⚠️ EMERGENCY!\n\n1. Go to the nearest hospital immediately\n2. Call 999 if possible\n3. Do not leave the patient alone\n4. Stay calm and reassure the patient\n\n⛔ This is not medical advice. Please consult a doctor.",
        ),
        SeverityLevel::High => (
            "⚡ গুরুতর অবস্থা\n\n১. আজকেই ডাক্তার দেখান\n২. পর্যাপ্ত বিশ্রাম নিন\n৩. প্রচুর পানি পান করুন\n৪. লক্ষণ খারাপ হলে হাসপাতালে যান\n\n⛔ এটি চিকিৎসা পরামর্শ নয়।",
            "⚡ Serious Condition\n\n1. Visit a doctor today\n2. Get adequate rest\n3. Drink plenty of water\n4. Go to hospital if symptoms worsen\n\n⛔ This is not medical advice.",
        ),
        SeverityLevel::Medium => (
            "⚡ মাঝারি অবস্থা\n\n১. আজকেই বা আগামীকাল ডাক্তার দেখান\n২. পর্যাপ্ত বিশ্রাম নিন\n৩. প্রচুর পানি পান করুন\n৪. লক্ষণ খারাপ হলে হাসপাতালে যান\n\n⛔ এটি চিকিৎসা পরামর্শ নয়।",
            "⚡ Moderate Condition\n\n1. Visit a doctor today or tomorrow\n2. Get adequate rest\n3. Drink plenty of water\n4. Go to hospital if symptoms worsen\n\n⛔ This is not medical advice.",
        ),
        SeverityLevel::Low => (
            "✅ হালকা অবস্থা\n\n১. ঘরে বিশ্রাম নিন\n২. প্রচুর পানি ও তরল খাবার খান\n৩. প্যারাসিটামল নিতে পারেন (প্রাপ্তবয়স্কদের জন্য)\n৪. ২-৩ দিনে ভালো না হলে ডাক্তার দেখান\n\n⛔ এটি চিকিৎসা পরামর্শ নয়।",
            "✅ Mild Condition\n\n1. Rest at home\n2. Drink plenty of water and fluids\n3. Can take Paracetamol (for adults)\n4. See a doctor if not better in 2-3 days\n\n⛔ This is not medical advice.",
        ),
    }
}

fn insufficient_input_text() -> GuidanceText {
    GuidanceText {
        explanation: "কোনো লক্ষণ নির্বাচন করা হয়নি।\n\nNo symptoms were provided.".to_string(),
        guidance_bn: "তথ্য অপর্যাপ্ত। অন্তত একটি লক্ষণ নির্বাচন করুন।\n\n⛔ এটি চিকিৎসা পরামর্শ নয়।"
            .to_string(),
        guidance_en: "Not enough information. Please select at least one symptom.\n\n⛔ This is not medical advice."
            .to_string(),
    }
}
