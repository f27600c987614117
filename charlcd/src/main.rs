mod config;

use crate::config::Config;
use charlcd_gpio::GpioActiveLevel::Low;
use charlcd_gpio::GpioDriver;
use charlcd_gpio::delay::ThreadDelay;
use charlcd_gpio::gpiod::GpiodDriver;
use charlcd_gpio::lcd::hd44780::{GpioHd44780Driver, Hd44780Driver};
use dotenv::dotenv;
use log::{debug, info};
use std::env::var;
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;

fn parse_pin_bus(pin_str: &str) -> eyre::Result<[usize; 4]> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| eyre::eyre!("Invalid number of data pins"))
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("charlcd starting...");

    // Get pin numbers from env
    let lcd_en_pin_no: usize = var("CHARLCD_PIN_EN")?.parse()?;
    let lcd_rw_pin_no: usize = var("CHARLCD_PIN_RW")?.parse()?;
    let lcd_rs_pin_no: usize = var("CHARLCD_PIN_RS")?.parse()?;
    let lcd_bl_pin_no: usize = var("CHARLCD_PIN_BL")?.parse()?;
    let lcd_data_pin_nos: [usize; 4] = parse_pin_bus(&var("CHARLCD_PINS_DATA")?)?;

    let chip_path = var("CHARLCD_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());

    info!(
        "LCD @ EN: {}, RW: {}, RS: {}, BL: {}, Data: {:?}",
        lcd_en_pin_no, lcd_rw_pin_no, lcd_rs_pin_no, lcd_bl_pin_no, lcd_data_pin_nos
    );

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&chip_path)?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing LCD driver...");
    let mut lcd_en_pin = gpio.get_pin(lcd_en_pin_no)?;
    let lcd_en_out = lcd_en_pin.as_output()?;
    let mut lcd_rw_pin = gpio.get_pin(lcd_rw_pin_no)?;
    let lcd_rw_out = lcd_rw_pin.as_output()?;
    let mut lcd_rs_pin = gpio.get_pin(lcd_rs_pin_no)?;
    let lcd_rs_out = lcd_rs_pin.as_output()?;
    let mut lcd_bl_pin = gpio.get_pin(lcd_bl_pin_no)?;
    // Some backlight circuits sink current through the pin instead of
    // sourcing it.
    if var("CHARLCD_BL_ACTIVE_LOW").is_ok_and(|v| v == "1") {
        lcd_bl_pin.set_active_level(Low)?;
    }
    let lcd_bl_out = lcd_bl_pin.as_output()?;
    let mut lcd_data_bus = gpio.get_pin_bus(lcd_data_pin_nos)?;
    let delay = ThreadDelay;
    let mut lcd = GpioHd44780Driver::new_4bit(
        &*lcd_en_out,
        &*lcd_rw_out,
        &*lcd_rs_out,
        &*lcd_bl_out,
        &mut *lcd_data_bus,
        &delay,
    );

    lcd.init()?;
    debug!("{:?} initialized.", lcd);

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };

    lcd.set_backlight(config.backlight)?;

    lcd.set_cursor(0, 0)?;
    lcd.print(&config.greeting)?;

    info!("charlcd initialized.");

    info!("Starting clock loop...");
    let clock_format = format_description!("[hour]:[minute]:[second]");
    loop {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        lcd.set_cursor(0, 1)?;
        // The print cache swallows the redundant refreshes between second
        // boundaries.
        lcd.print(&now.format(clock_format)?)?;

        thread::sleep(Duration::from_millis(250));
    }
}
