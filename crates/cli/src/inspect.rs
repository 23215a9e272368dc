//! Device listing and inspection

use anyhow::{Context, Result, anyhow};
use common::{DeviceFilter, matches_any};
use tracing::{debug, info, warn};
use usbref::{
    BosDescriptor, Capability, CapabilityType, ClaimedInterface, ConfigDescriptor, DeviceRef,
    OpenHandle, Session,
};

use crate::config::CliConfig;

/// Print every device admitted by `filters`.
pub fn list_devices(session: &Session, filters: &[DeviceFilter], verbose: bool) -> Result<()> {
    info!("Listing USB devices...");

    let devices = session.enumerate().context("Failed to enumerate devices")?;
    let total = devices.total();
    let mut shown = 0;

    for device in devices {
        let descriptor = match device.device_descriptor() {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    "Skipping device on bus {:03} address {:03}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };
        if !matches_any(filters, descriptor.vendor_id(), descriptor.product_id()) {
            continue;
        }
        shown += 1;

        println!(
            "{}",
            device_line(
                device.bus_number(),
                device.address(),
                descriptor.vendor_id(),
                descriptor.product_id()
            )
        );
        println!(
            "      Port {} Speed: {}{}",
            device.port_number(),
            device.speed(),
            parent_suffix(&device)
        );

        if verbose {
            print_configs(&device, descriptor.num_configurations());
            print_bos(session, &device);
        }
    }

    if shown == 0 {
        println!("No USB devices found.");
    }
    debug!("Listed {} of {} enumerated device(s)", shown, total);
    Ok(())
}

/// Open the first device admitted by `filter` and print its details.
///
/// With `claim`, the interface is claimed and released again.
pub fn inspect_device(
    session: &Session,
    filter: &DeviceFilter,
    claim: Option<u8>,
    config: &CliConfig,
) -> Result<()> {
    let mut handle = open_matching(session, filter)?;
    let device = handle.device().context("Failed to get device of handle")?;
    let descriptor = device
        .device_descriptor()
        .context("Failed to read device descriptor")?;

    println!(
        "{}",
        device_line(
            device.bus_number(),
            device.address(),
            descriptor.vendor_id(),
            descriptor.product_id()
        )
    );

    let strings = [
        ("Manufacturer", descriptor.manufacturer_string_index()),
        ("Product", descriptor.product_string_index()),
        ("Serial", descriptor.serial_number_string_index()),
    ];
    for (label, index) in strings {
        let Some(index) = index else { continue };
        match handle.read_string_descriptor_ascii(index) {
            Ok(value) => println!("      {}: {}", label, value),
            Err(e) => debug!("Failed to read {} string: {}", label, e),
        }
    }

    println!(
        "      USB {}  Device {}  Class 0x{:02x}",
        bcd(descriptor.usb_version()),
        bcd(descriptor.device_version()),
        descriptor.class_code()
    );
    match handle.configuration() {
        Ok(value) => println!("      {}", configuration_line(value)),
        Err(e) => warn!("Failed to read active configuration: {}", e),
    }

    if let Some(interface) = claim {
        claim_and_release(session, &handle, interface, config.auto_detach_kernel_driver)?;
    }

    handle.close();
    Ok(())
}

fn open_matching(session: &Session, filter: &DeviceFilter) -> Result<OpenHandle> {
    if let Some((vendor_id, product_id)) = filter.as_exact() {
        return session
            .open_by_vendor_product(vendor_id, product_id)
            .with_context(|| format!("Failed to open {}", filter));
    }

    let devices = session.enumerate().context("Failed to enumerate devices")?;
    for device in devices {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };
        if filter.matches(descriptor.vendor_id(), descriptor.product_id()) {
            return device
                .open()
                .with_context(|| format!("Failed to open device matching {}", filter));
        }
    }
    Err(anyhow!("No device matches {}", filter))
}

fn claim_and_release(
    session: &Session,
    handle: &OpenHandle,
    interface: u8,
    auto_detach: bool,
) -> Result<()> {
    if auto_detach && session.has_capability(Capability::SupportsDetachKernelDriver) {
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            warn!("Automatic kernel driver detach unavailable: {}", e);
        }
    } else if handle.kernel_driver_active(interface).unwrap_or(false) {
        warn!(
            "Interface {} is bound to a kernel driver; claiming will likely fail",
            interface
        );
    }

    let claimed = ClaimedInterface::claim(handle, interface)
        .with_context(|| format!("Failed to claim interface {}", interface))?;
    println!("      Claimed interface {}", claimed.interface());
    claimed
        .release()
        .with_context(|| format!("Failed to release interface {}", interface))?;
    println!("      Released interface {}", interface);
    Ok(())
}

fn print_configs(device: &DeviceRef, count: u8) {
    for index in 0..count {
        match device.config_descriptor(index) {
            Ok(config) => print_config(&config),
            Err(e) => debug!("Failed to read configuration {}: {}", index, e),
        }
    }
}

fn print_config(config: &ConfigDescriptor) {
    println!(
        "      Config {}: {} interface(s), {}mA{}{}",
        config.number(),
        config.num_interfaces(),
        u32::from(config.max_power()) * 2,
        if config.self_powered() { ", self-powered" } else { "" },
        if config.remote_wakeup() { ", remote wakeup" } else { "" }
    );
    for interface in config.interfaces() {
        for setting in interface.descriptors() {
            println!(
                "        Interface {} alt {}: class 0x{:02x}/0x{:02x}/0x{:02x}",
                setting.interface_number(),
                setting.setting_number(),
                setting.class_code(),
                setting.sub_class_code(),
                setting.protocol_code()
            );
            for endpoint in setting.endpoint_descriptors() {
                println!(
                    "          Endpoint 0x{:02x} {:?} {:?} max {} interval {}",
                    endpoint.address(),
                    endpoint.direction(),
                    endpoint.transfer_type(),
                    endpoint.max_packet_size(),
                    endpoint.interval()
                );
            }
        }
    }
}

fn print_bos(session: &Session, device: &DeviceRef) {
    let bos = match device.open().and_then(|handle| handle.bos_descriptor()) {
        Ok(bos) => bos,
        Err(e) => {
            debug!("No BOS descriptor: {}", e);
            return;
        }
    };
    print_capabilities(session, &bos);
}

fn print_capabilities(session: &Session, bos: &BosDescriptor) {
    println!("      BOS: {} capability(ies)", bos.num_device_caps());
    for capability in bos.capabilities() {
        match capability.capability_type() {
            CapabilityType::Usb20Extension => {
                if let Ok(ext) = session.usb_2_0_extension_descriptor(&capability) {
                    println!("        USB 2.0 extension: LPM {}", yes_no(ext.supports_lpm()));
                }
            }
            CapabilityType::SsUsbDeviceCapability => {
                if let Ok(ss) = session.ss_usb_device_capability_descriptor(&capability) {
                    println!(
                        "        SuperSpeed: speeds 0x{:04x}, U1 {}us, U2 {}us",
                        ss.speeds_supported(),
                        ss.u1_exit_latency(),
                        ss.u2_exit_latency()
                    );
                }
            }
            CapabilityType::ContainerId => {
                if let Ok(id) = session.container_id_descriptor(&capability) {
                    println!("        Container ID: {}", hex(&id.container_id()));
                }
            }
            CapabilityType::Other(code) => {
                println!("        Capability type 0x{:02x}", code);
            }
        }
    }
}

fn parent_suffix(device: &DeviceRef) -> String {
    match device.parent() {
        Some(parent) => format!(
            " Parent: bus {:03} address {:03}",
            parent.bus_number(),
            parent.address()
        ),
        None => String::new(),
    }
}

fn device_line(bus: u8, address: u8, vendor_id: u16, product_id: u16) -> String {
    format!(
        "Bus {:03} Device {:03}: ID {:04x}:{:04x}",
        bus, address, vendor_id, product_id
    )
}

/// Format a binary-coded decimal version such as `bcdUSB`.
fn bcd(value: u16) -> String {
    format!("{:x}.{:02x}", value >> 8, value & 0xff)
}

// 0 is a valid bConfigurationValue on some devices and is printed as is.
fn configuration_line(value: u8) -> String {
    format!("Configuration: {}", value)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
