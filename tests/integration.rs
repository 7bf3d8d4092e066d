use std::{fs, path::Path, path::PathBuf, process::Command};

fn run_bin(dir: &Path, args: &[&str]) -> String {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_hr-analysis"));

    let output = Command::new(bin)
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );

    stdout_str.to_string()
}

fn fresh_dir(name: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir_all(&test_dir).expect("failed to create test directory");
    test_dir
}

fn assert_pdf(path: &Path, pages: usize) {
    let bytes = fs::read(path).expect("failed to read pdf");
    assert!(bytes.starts_with(b"%PDF-1.4"), "{path:?} is not a pdf");
    let text = String::from_utf8_lossy(&bytes);
    assert!(
        text.contains(&format!("/Count {pages}")),
        "{path:?} should have {pages} pages"
    );
}

fn wearable_export() -> String {
    let participants = [
        ("21.0", 0, 20),
        ("23.5", 1, 25),
        ("25.1", 0, 30),
        ("27.2", 1, 35),
        ("29.9", 0, 40),
        ("31.4", 1, 45),
    ];
    let activities = [("Lying", 0.0), ("Sitting", 8.0), ("Running 3 METs", 35.0)];

    let mut csv = String::from("X1,age,gender,BMI,heart_rate,device,activity\n");
    let mut row = 0;
    for (p, (bmi, gender, age)) in participants.iter().enumerate() {
        for (activity, offset) in activities {
            for device in ["AW", "FB"] {
                for repeat in 0..2 {
                    let device_offset = if device == "AW" {
                        (p % 3) as f64 * 1.5
                    } else {
                        0.0
                    };
                    let hr = 62.0 + p as f64 * 3.0 + offset + device_offset + repeat as f64;
                    csv.push_str(&format!(
                        "{row},{age},{gender},{bmi},{hr},{device},{activity}\n"
                    ));
                    row += 1;
                }
            }
        }
    }
    csv
}

fn skin_tone_table() -> String {
    let devices = ["Apple", "Fitbit", "Garmin", "Xiaomi", "Empatica", "Biovotion"];
    let mut csv = format!("ID,{},ECG,Skin Tone\n", devices.join(","));
    for i in 0..36 {
        let ecg = 55.0 + (i * 7 % 100) as f64;
        let tone = i % 6 + 1;
        let mut cells = vec![format!("{}", i / 3)];
        for (d, _) in devices.iter().enumerate() {
            if (i + d) % 11 == 0 {
                // Missing reading
                cells.push(String::new());
            } else {
                let noise = ((i * (d + 2)) % 7) as f64 - 3.0;
                cells.push(format!("{}", ecg + noise));
            }
        }
        cells.push(format!("{ecg}"));
        cells.push(format!("{tone}"));
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }
    csv
}

#[test]
fn participant_workflow() {
    let test_dir = fresh_dir("participant_workflow");
    fs::write(test_dir.join("aw_fb_cleansed.csv"), wearable_export())
        .expect("failed to write export");

    let stdout = run_bin(&test_dir, &["participants"]);
    assert!(stdout.contains("Participant 1: Age 20, BMI 21.0, Gender 0"));
    let summary = fs::read_to_string(test_dir.join("participant_summary_corrected.csv"))
        .expect("failed to read summary");
    assert!(summary.starts_with("participant_id,gender,age,BMI,heart_rate,device,activity"));
    // 6 participants x 3 activities x 2 devices
    assert_eq!(summary.lines().count(), 37);

    let stdout = run_bin(&test_dir, &["--report", "paired.json", "paired"]);
    assert!(stdout.contains("--- Paired T-test (AW vs FB) ---"));
    assert!(stdout.contains("--- ANOVA: HR_diff vs BMI Group ---"));
    let processed = fs::read_to_string(test_dir.join("processed_participant_data.csv"))
        .expect("failed to read processed data");
    assert!(processed
        .starts_with("participant_id,gender,age,BMI,heart_rate_AW,heart_rate_FB,HR_diff"));
    assert_eq!(processed.lines().count(), 7);

    let report = fs::read_to_string(test_dir.join("paired.json")).expect("failed to read report");
    let report: serde_json::Value = serde_json::from_str(&report).expect("invalid report json");
    assert_eq!(report["analysis"], "paired");
    assert_eq!(report["participants"], 6);
    assert!(report["anova_gender"]["factor"]["f"].is_number());

    let stdout = run_bin(&test_dir, &["demographics"]);
    assert!(stdout.contains("Total participants: 6"));
    let stats = fs::read_to_string(test_dir.join("age_bmi_descriptive_stats.csv"))
        .expect("failed to read stats");
    assert!(stats.starts_with(",age,BMI"));
    assert!(stats.contains("mean,32.5,"));
    let counts =
        fs::read_to_string(test_dir.join("gender_counts.csv")).expect("failed to read counts");
    assert!(counts.starts_with("gender,count"));

    let stdout = run_bin(&test_dir, &["device-correlation"]);
    assert!(stdout.contains("Pearson correlation (r) = "));
    assert_pdf(&test_dir.join("device_correlation.pdf"), 1);

    let stdout = run_bin(&test_dir, &["activity-correlation"]);
    assert!(stdout.contains("Activity: Lying"));
    assert!(stdout.contains("Activity: Running 3 METs"));

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn skin_tone_figures() {
    let test_dir = fresh_dir("skin_tone_figures");
    fs::write(test_dir.join("deidentified_data.csv"), skin_tone_table())
        .expect("failed to write table");

    let stdout = run_bin(&test_dir, &["--report", "skin.json", "skin-tone"]);
    assert!(stdout.contains("CORRELATION SUMMARY TABLE"));
    assert!(stdout.contains("Number of unique IDs: 12"));
    assert_pdf(&test_dir.join("bent_analysis_figures.pdf"), 6);

    let report = fs::read_to_string(test_dir.join("skin.json")).expect("failed to read report");
    let report: serde_json::Value = serde_json::from_str(&report).expect("invalid report json");
    let devices = report["devices"].as_array().expect("devices array");
    assert_eq!(devices.len(), 6);
    assert_eq!(devices[0]["device"], "Apple");
    assert!(devices[0]["overall"]["correlation"]["r"].as_f64().unwrap() > 0.9);

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn trend_tables() {
    let test_dir = fresh_dir("trend_tables");

    let stdout = run_bin(&test_dir, &["trend", "--preset", "studies"]);
    assert!(stdout.contains("Total studies from 2015-2025: 108"));
    assert!(stdout.contains("Year with the most studies: 2021 with 18 studies"));
    assert!(stdout.contains("Statistical Power: "));
    assert_pdf(&test_dir.join("Apple_Watch_Clinical_Studies.pdf"), 1);

    let stdout = run_bin(&test_dir, &["trend", "--preset", "sales"]);
    assert!(stdout.contains("Total sales from 2015-2023: 251.10 million"));
    assert!(!stdout.contains("Statistical Power"));
    assert_pdf(&test_dir.join("Apple_Watch_Sales.pdf"), 1);

    let spec = r#"{
        "title": "Papers per year",
        "y_label": "Papers",
        "noun": "papers",
        "years": [2019, 2020, 2021, 2022],
        "values": [3, 5, 4, 9],
        "integer_values": true,
        "power": true,
        "output": "papers.pdf"
    }"#;
    fs::write(test_dir.join("papers.json"), spec).expect("failed to write spec");
    let stdout = run_bin(
        &test_dir,
        &["trend", "--spec", "papers.json", "--output", "custom.pdf"],
    );
    assert!(stdout.contains("Year with the fewest papers: 2019 with 3 papers"));
    assert_pdf(&test_dir.join("custom.pdf"), 1);
    assert!(!test_dir.join("papers.pdf").exists());

    fs::remove_dir_all(&test_dir).ok();
}
