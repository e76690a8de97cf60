use anyhow::{Result, anyhow};

use verdant_garden::{LightLevel, PlantType};

pub(crate) fn run_humidity_guide(plant_type: Option<&str>) -> Result<()> {
    let types = match plant_type {
        Some(raw) => vec![raw.parse::<PlantType>().map_err(|err| anyhow!(err))?],
        None => PlantType::ALL.to_vec(),
    };

    for (idx, plant_type) in types.into_iter().enumerate() {
        if idx > 0 {
            println!();
        }
        let guide = plant_type.humidity();
        println!("── {plant_type} ──────────────────────────────");
        println!("  optimal humidity : {}", guide.range);
        println!("  {}", guide.description);
        for tip in guide.tips {
            println!("  • {tip}");
        }
    }
    Ok(())
}

pub(crate) fn run_light_reading(brightness: f64) {
    let reading = LightLevel::reading(brightness);
    println!("── light meter ──────────────────────────────────────");
    println!("  brightness : {:.1}", reading.value);
    println!("  level      : {}", reading.level);
    println!("  {}", reading.description);
    println!("  good for   : {}", reading.recommended_for);
}
