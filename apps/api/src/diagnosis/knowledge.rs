/// A condition known to the rule-based engine.
pub struct Condition {
    pub name: &'static str,
    pub symptoms: &'static [&'static str],
    pub severity: &'static str,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
}

pub const CONDITIONS: &[Condition] = &[
    Condition {
        name: "Common Cold",
        symptoms: &["runny nose", "sneezing", "sore throat", "cough", "congestion", "mild fever"],
        severity: "mild",
        description: "A viral infection of the nose and throat, usually harmless.",
        recommendations: &[
            "Rest and stay hydrated",
            "Use saline nasal spray for congestion",
            "See a doctor if symptoms last more than 10 days",
        ],
    },
    Condition {
        name: "Influenza",
        symptoms: &["fever", "chills", "body aches", "fatigue", "cough", "headache", "sore throat"],
        severity: "moderate",
        description: "A contagious respiratory illness caused by influenza viruses.",
        recommendations: &[
            "Rest and drink plenty of fluids",
            "Consider antiviral medication within 48 hours of onset",
            "Seek care if breathing becomes difficult",
        ],
    },
    Condition {
        name: "COVID-19",
        symptoms: &[
            "fever",
            "cough",
            "shortness of breath",
            "loss of taste",
            "loss of smell",
            "fatigue",
            "body aches",
        ],
        severity: "moderate",
        description: "A respiratory illness caused by the SARS-CoV-2 coronavirus.",
        recommendations: &[
            "Take a COVID-19 test",
            "Isolate from others until symptoms improve",
            "Seek emergency care for trouble breathing or chest pain",
        ],
    },
    Condition {
        name: "Strep Throat",
        symptoms: &["sore throat", "fever", "swollen lymph nodes", "painful swallowing", "headache"],
        severity: "moderate",
        description: "A bacterial throat infection that can cause complications if untreated.",
        recommendations: &[
            "Get a rapid strep test",
            "Complete the full course of prescribed antibiotics",
            "Use warm liquids or lozenges to soothe the throat",
        ],
    },
    Condition {
        name: "Migraine",
        symptoms: &["headache", "nausea", "sensitivity to light", "sensitivity to sound", "blurred vision", "dizziness"],
        severity: "moderate",
        description: "A neurological condition causing intense, often one-sided headaches.",
        recommendations: &[
            "Rest in a dark, quiet room",
            "Track triggers such as sleep, food and stress",
            "Discuss preventive treatment with a doctor if attacks are frequent",
        ],
    },
    Condition {
        name: "Gastroenteritis",
        symptoms: &["nausea", "vomiting", "diarrhea", "abdominal pain", "stomach cramps", "fever"],
        severity: "moderate",
        description: "Inflammation of the stomach and intestines, usually from an infection.",
        recommendations: &[
            "Drink small amounts of fluid often to avoid dehydration",
            "Use oral rehydration solutions",
            "Seek care if unable to keep fluids down for 24 hours",
        ],
    },
    Condition {
        name: "Allergic Rhinitis",
        symptoms: &["sneezing", "runny nose", "itchy eyes", "watery eyes", "congestion"],
        severity: "mild",
        description: "An allergic reaction to airborne substances such as pollen or dust.",
        recommendations: &[
            "Avoid known allergens",
            "Consider over-the-counter antihistamines",
            "Keep windows closed during high pollen days",
        ],
    },
    Condition {
        name: "Pneumonia",
        symptoms: &["cough", "fever", "chills", "shortness of breath", "chest pain", "fatigue"],
        severity: "severe",
        description: "An infection that inflames the air sacs in one or both lungs.",
        recommendations: &[
            "See a doctor promptly for evaluation",
            "Chest imaging may be required",
            "Seek emergency care if breathing is difficult",
        ],
    },
    Condition {
        name: "Urinary Tract Infection",
        symptoms: &["painful urination", "frequent urination", "lower abdominal pain", "cloudy urine", "fever"],
        severity: "moderate",
        description: "An infection in any part of the urinary system.",
        recommendations: &[
            "Drink plenty of water",
            "See a doctor for a urine test and antibiotics",
            "Seek care quickly if back pain or high fever develops",
        ],
    },
    Condition {
        name: "Hypertension",
        symptoms: &["headache", "dizziness", "blurred vision", "chest pain", "shortness of breath", "nosebleeds"],
        severity: "moderate",
        description: "Persistently elevated blood pressure in the arteries.",
        recommendations: &[
            "Measure blood pressure regularly",
            "Reduce salt intake and exercise regularly",
            "Consult a doctor about long-term management",
        ],
    },
    Condition {
        name: "Type 2 Diabetes",
        symptoms: &["increased thirst", "frequent urination", "fatigue", "blurred vision", "slow healing", "weight loss"],
        severity: "moderate",
        description: "A chronic condition affecting how the body regulates blood sugar.",
        recommendations: &[
            "Get a blood glucose or HbA1c test",
            "Adopt a balanced diet and regular activity",
            "Follow up with a doctor for a management plan",
        ],
    },
    Condition {
        name: "Anxiety Disorder",
        symptoms: &["restlessness", "rapid heartbeat", "sweating", "trouble sleeping", "fatigue", "dizziness"],
        severity: "mild",
        description: "Persistent, excessive worry that interferes with daily activities.",
        recommendations: &[
            "Practice breathing exercises and regular sleep",
            "Limit caffeine and alcohol",
            "Talk to a mental health professional",
        ],
    },
];
