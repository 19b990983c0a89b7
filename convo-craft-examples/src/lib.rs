use std::str::FromStr;

use anyhow::Result;
use candle_core::Device;

#[derive(Debug, Clone)]
pub enum DeviceOption {
    Cpu,
    Metal,
    Cuda(usize),
}

impl FromStr for DeviceOption {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Self::Cpu),
            "metal" => Ok(Self::Metal),
            cuda if cuda.starts_with("cuda:") => {
                let id_part = &cuda["cuda:".len()..];
                let device_id = id_part
                    .parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("Invalid CUDA device id: {}", id_part))?;
                Ok(Self::Cuda(device_id))
            }
            _ => Err(anyhow::anyhow!(
                "Unknown device '{s}' (expected cpu, metal, or cuda:<id>)"
            )),
        }
    }
}

pub fn get_device(option: &DeviceOption) -> Result<Device> {
    let device = match option {
        DeviceOption::Cuda(device_id) if cfg!(feature = "cuda") => Device::new_cuda(*device_id)?,
        DeviceOption::Metal if cfg!(feature = "metal") => Device::new_metal(0)?,
        _ => Device::Cpu,
    };

    Ok(device)
}
